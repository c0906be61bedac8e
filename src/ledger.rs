//! The SmallBank ledger operations.
//!
//! Each operation reads what it needs through an [`AccountStore`], computes
//! the new balances and writes them back. Nothing is cached between calls and
//! nothing is locked here: two-account operations read both records before
//! mutating either, and rely on the backend to commit both writes together.
//!
//! Every operation except [`create_account`] leaves the sum of all balances
//! unchanged.

use crate::account::Account;
use crate::error::{LedgerError, Result};
use crate::operation::Operation;
use crate::store::{AccountStore, KvStore};
use log::debug;

/// Runs one validated operation. Only `query` produces an account.
pub fn apply<S: KvStore>(store: &mut AccountStore<S>, op: &Operation) -> Result<Option<Account>> {
    match op {
        Operation::CreateAccount {
            id,
            name,
            checking,
            savings,
        } => create_account(store, id, name, *checking, *savings)?,
        Operation::DepositChecking { amount, id } => deposit_checking(store, *amount, id)?,
        Operation::WriteCheck { amount, id } => write_check(store, *amount, id)?,
        Operation::TransactSavings { amount, id } => transact_savings(store, *amount, id)?,
        Operation::SendPayment {
            amount,
            dest,
            source,
        } => send_payment(store, *amount, dest, source)?,
        Operation::Amalgamate { dest, source } => amalgamate(store, dest, source)?,
        Operation::Query { id } => return query(store, id).map(Some),
    }
    Ok(None)
}

/// Stores a new account with the given opening balances.
///
/// Re-creating an existing id overwrites the previous record (last write
/// wins); no existence check is made.
pub fn create_account<S: KvStore>(
    store: &mut AccountStore<S>,
    id: &str,
    name: &str,
    checking: i64,
    savings: i64,
) -> Result<()> {
    store.put(&Account::new(id, name, checking, savings))?;
    debug!("Created account {} ({}, {})", id, checking, savings);
    Ok(())
}

pub fn deposit_checking<S: KvStore>(store: &mut AccountStore<S>, amount: i64, id: &str) -> Result<()> {
    let mut account = store.get(id)?;
    account.checking_balance = credit(account.checking_balance, amount, id)?;
    store.put(&account)?;
    debug!("Deposited {} to checking of {}", amount, id);
    Ok(())
}

/// Debits checking. There is no overdraft guard.
pub fn write_check<S: KvStore>(store: &mut AccountStore<S>, amount: i64, id: &str) -> Result<()> {
    let mut account = store.get(id)?;
    account.checking_balance = debit(account.checking_balance, amount, id)?;
    store.put(&account)?;
    debug!("Wrote check of {} against {}", amount, id);
    Ok(())
}

/// Adds `amount` to savings; a negative amount is a withdrawal.
pub fn transact_savings<S: KvStore>(store: &mut AccountStore<S>, amount: i64, id: &str) -> Result<()> {
    let mut account = store.get(id)?;
    account.savings_balance = credit(account.savings_balance, amount, id)?;
    store.put(&account)?;
    debug!("Savings transaction of {} on {}", amount, id);
    Ok(())
}

/// Moves `amount` from `source`'s checking to `dest`'s checking.
///
/// The destination is loaded first, so when both ids are unknown the
/// destination is the one reported.
pub fn send_payment<S: KvStore>(
    store: &mut AccountStore<S>,
    amount: i64,
    dest_id: &str,
    source_id: &str,
) -> Result<()> {
    let mut dest = store.get(dest_id)?;
    if dest_id == source_id {
        // Paying yourself moves nothing.
        store.put(&dest)?;
        debug!("Self-payment of {} on {}", amount, dest_id);
        return Ok(());
    }
    let mut source = store.get(source_id)?;

    source.checking_balance = debit(source.checking_balance, amount, source_id)?;
    dest.checking_balance = credit(dest.checking_balance, amount, dest_id)?;

    store.put(&source)?;
    store.put(&dest)?;
    debug!("Sent {} from {} to {}", amount, source_id, dest_id);
    Ok(())
}

/// Moves all of `source`'s savings into `dest`'s checking and zeroes the
/// source's savings.
pub fn amalgamate<S: KvStore>(store: &mut AccountStore<S>, dest_id: &str, source_id: &str) -> Result<()> {
    let mut dest = store.get(dest_id)?;
    if dest_id == source_id {
        dest.checking_balance = credit(dest.checking_balance, dest.savings_balance, dest_id)?;
        dest.savings_balance = 0;
        store.put(&dest)?;
        debug!("Amalgamated savings of {} into its own checking", dest_id);
        return Ok(());
    }
    let mut source = store.get(source_id)?;

    let moved = source.savings_balance;
    dest.checking_balance = credit(dest.checking_balance, moved, dest_id)?;
    source.savings_balance = 0;

    store.put(&source)?;
    store.put(&dest)?;
    debug!("Amalgamated {} from {} into {}", moved, source_id, dest_id);
    Ok(())
}

/// Read-only lookup. A missing id is [`LedgerError::NotFound`], as on every
/// other read path.
pub fn query<S: KvStore>(store: &mut AccountStore<S>, id: &str) -> Result<Account> {
    store.get(id)
}

fn credit(balance: i64, amount: i64, id: &str) -> Result<i64> {
    balance
        .checked_add(amount)
        .ok_or_else(|| LedgerError::Overflow { id: id.to_string() })
}

fn debit(balance: i64, amount: i64, id: &str) -> Result<i64> {
    balance
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::Overflow { id: id.to_string() })
}
