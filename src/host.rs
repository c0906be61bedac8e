//! In-process transactional host.
//!
//! Runs each invocation against a private [`TxContext`] and commits its writes
//! atomically with optimistic concurrency control:
//!
//! - reads go to the invocation's own write buffer first, otherwise to the
//!   latest committed value, whose version is recorded in the read set
//! - writes are buffered until commit
//! - commit re-checks every recorded version under the state lock; if any key
//!   changed since it was read the whole invocation is rejected with a read
//!   conflict and nothing is applied
//!
//! [`MemoryHost::execute`] re-runs conflicted invocations up to
//! [`HostConfig::max_retries`] times. Two transfers touching the same account
//! therefore serialize, and the sum of balances is preserved under any
//! interleaving.

use crate::account::Account;
use crate::error::{LedgerError, Result};
use crate::keys::Namespace;
use crate::store::{AccountStore, KvStore, StoreError};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Version recorded for keys that did not exist when read.
const ABSENT: u64 = 0;

/// Host tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    /// How many times a conflicted invocation is re-run before the conflict
    /// is reported to the caller.
    pub max_retries: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig { max_retries: 8 }
    }
}

#[derive(Debug)]
struct Versioned {
    value: Vec<u8>,
    version: u64,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, Versioned>,
    /// Last commit sequence number; also the version stamped on its writes.
    sequence: u64,
}

impl State {
    fn version_of(&self, key: &str) -> u64 {
        self.entries.get(key).map_or(ABSENT, |v| v.version)
    }
}

/// A versioned in-memory key-value store executing invocations atomically.
pub struct MemoryHost {
    state: Mutex<State>,
    namespace: Namespace,
    config: HostConfig,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        MemoryHost {
            state: Mutex::new(State::default()),
            namespace: Namespace::smallbank().clone(),
            config,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Opens a transaction context over the committed state.
    pub fn begin(&self) -> TxContext<'_> {
        TxContext {
            state: &self.state,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Runs `f` as one atomic invocation.
    ///
    /// If `f` fails, its writes are discarded. If commit hits a read conflict,
    /// `f` is run again on fresh state, up to the configured retry limit.
    pub fn execute<T, F>(&self, f: F) -> Result<T>
    where
        F: FnMut(&mut AccountStore<TxContext<'_>>) -> Result<T>,
    {
        self.execute_counted(f).0
    }

    /// Same as [`MemoryHost::execute`], also returning how many times `f` was
    /// re-run after a read conflict.
    pub fn execute_counted<T, F>(&self, mut f: F) -> (Result<T>, u32)
    where
        F: FnMut(&mut AccountStore<TxContext<'_>>) -> Result<T>,
    {
        let mut retries = 0;
        loop {
            let mut store = AccountStore::with_namespace(self.begin(), self.namespace.clone());
            let result = f(&mut store).and_then(|value| {
                store.into_inner().commit().map_err(|e| match e {
                    StoreError::Conflict { key } => LedgerError::Conflict { key },
                    StoreError::Backend(msg) => LedgerError::System(msg),
                })?;
                Ok(value)
            });

            match result {
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    debug!("{}; retrying (attempt {})", e, retries);
                }
                other => return (other, retries),
            }
        }
    }

    /// Committed entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, Vec<u8>)> {
        let state = self.state.lock();
        state
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, v)| (key.clone(), v.value.clone()))
            .collect()
    }

    /// Every account committed under this host's namespace, ordered by id.
    ///
    /// Entries in the namespace that do not decode are skipped with a warning.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .scan_prefix(self.namespace.prefix())
            .into_iter()
            .filter_map(|(key, bytes)| match Account::decode(&bytes) {
                Ok(account) => Some(account),
                Err(e) => {
                    warn!("Skipping undecodable record at key {}: {}", key, e);
                    None
                }
            })
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    /// Number of commits applied so far.
    pub fn sequence(&self) -> u64 {
        self.state.lock().sequence
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

/// The view one invocation has of the host: a read set and a write buffer.
pub struct TxContext<'h> {
    state: &'h Mutex<State>,
    reads: HashMap<String, u64>,
    writes: BTreeMap<String, Vec<u8>>,
}

impl TxContext<'_> {
    /// Validates the read set and applies all buffered writes as one commit.
    ///
    /// Contexts that wrote nothing commit trivially.
    pub fn commit(self) -> std::result::Result<(), StoreError> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();
        for (key, seen) in &self.reads {
            if state.version_of(key) != *seen {
                return Err(StoreError::Conflict { key: key.clone() });
            }
        }

        state.sequence += 1;
        let version = state.sequence;
        for (key, value) in self.writes {
            state.entries.insert(key, Versioned { value, version });
        }
        Ok(())
    }
}

impl KvStore for TxContext<'_> {
    fn get_state(&mut self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }

        let state = self.state.lock();
        let entry = state.entries.get(key);
        let version = entry.map_or(ABSENT, |v| v.version);
        // Keep the first version seen; a changed re-read is caught at commit.
        self.reads.entry(key.to_string()).or_insert(version);
        Ok(entry.map(|v| v.value.clone()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError> {
        self.writes.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger;

    fn seeded(accounts: &[(&str, i64, i64)]) -> MemoryHost {
        let host = MemoryHost::new();
        for (id, checking, savings) in accounts {
            host.execute(|store| ledger::create_account(store, id, id, *checking, *savings))
                .unwrap();
        }
        host
    }

    #[test]
    fn test_execute_commits_writes() {
        let host = seeded(&[("A", 100, 50)]);
        let account = host.execute(|store| ledger::query(store, "A")).unwrap();
        assert_eq!(account, Account::new("A", "A", 100, 50));
        assert_eq!(host.sequence(), 1);
    }

    #[test]
    fn test_failed_invocation_discards_writes() {
        let host = seeded(&[("A", 100, 0)]);
        let err = host
            .execute(|store| {
                ledger::write_check(store, 10, "A")?;
                ledger::deposit_checking(store, 1, "missing")
            })
            .unwrap_err();

        assert!(matches!(err, LedgerError::NotFound(_)));
        let account = host.execute(|store| ledger::query(store, "A")).unwrap();
        assert_eq!(account.checking_balance, 100);
    }

    #[test]
    fn test_reads_see_own_writes() {
        let host = seeded(&[]);
        let account = host
            .execute(|store| {
                ledger::create_account(store, "A", "Alice", 5, 5)?;
                ledger::deposit_checking(store, 5, "A")?;
                ledger::query(store, "A")
            })
            .unwrap();
        assert_eq!(account.checking_balance, 10);
    }

    #[test]
    fn test_stale_read_conflicts_at_commit() {
        let host = seeded(&[("A", 100, 0)]);
        let key = host.namespace().derive_key("A");

        let mut slow = host.begin();
        slow.get_state(&key).unwrap();

        host.execute(|store| ledger::deposit_checking(store, 1, "A"))
            .unwrap();

        slow.put_state(&key, b"{}".to_vec()).unwrap();
        assert_eq!(slow.commit(), Err(StoreError::Conflict { key }));
    }

    #[test]
    fn test_read_of_absent_key_conflicts_with_later_create() {
        let host = seeded(&[]);
        let key = host.namespace().derive_key("A");

        let mut slow = host.begin();
        assert_eq!(slow.get_state(&key).unwrap(), None);
        host.execute(|store| ledger::create_account(store, "A", "Alice", 1, 1))
            .unwrap();

        slow.put_state(&key, b"{}".to_vec()).unwrap();
        assert!(matches!(slow.commit(), Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn test_execute_retries_conflicts() {
        let host = seeded(&[("A", 0, 0)]);
        let mut runs = 0;
        let (result, retries) = host.execute_counted(|store| {
            runs += 1;
            let account = store.get("A")?;
            if runs == 1 {
                // Another invocation commits between our read and our commit.
                host.execute(|other| ledger::deposit_checking(other, 7, "A"))?;
            }
            let mut account = account;
            account.checking_balance += 1;
            store.put(&account)
        });

        result.unwrap();
        assert_eq!(runs, 2);
        assert_eq!(retries, 1);
        let account = host.execute(|store| ledger::query(store, "A")).unwrap();
        assert_eq!(account.checking_balance, 8);
    }

    #[test]
    fn test_execute_counted_without_contention() {
        let host = seeded(&[("A", 0, 0)]);
        let (result, retries) = host.execute_counted(|store| ledger::deposit_checking(store, 1, "A"));
        result.unwrap();
        assert_eq!(retries, 0);
    }

    #[test]
    fn test_execute_reports_conflict_after_retries() {
        let host = MemoryHost::with_config(HostConfig { max_retries: 2 });
        host.execute(|store| ledger::create_account(store, "A", "A", 0, 0))
            .unwrap();

        let (result, retries) = host.execute_counted(|store| {
            let mut account = store.get("A")?;
            host.execute(|other| ledger::deposit_checking(other, 1, "A"))?;
            account.checking_balance += 1;
            store.put(&account)
        });
        assert!(matches!(result, Err(LedgerError::Conflict { .. })));
        assert_eq!(retries, 2);
        // Each of the three runs committed one nested deposit and nothing else.
        let account = host.execute(|store| ledger::query(store, "A")).unwrap();
        assert_eq!(account.checking_balance, 3);
    }

    #[test]
    fn test_accounts_are_sorted_and_namespaced() {
        let host = seeded(&[("b", 1, 1), ("a", 2, 2)]);
        {
            let mut foreign = host.begin();
            foreign.put_state("zzzzzzunrelated", b"x".to_vec()).unwrap();
            foreign.commit().unwrap();
        }

        let ids: Vec<String> = host.accounts().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(host.scan_prefix("zzzzzz").len(), 1);
    }

    #[test]
    fn test_concurrent_transfers_conserve_money() {
        let ids = ["0", "1", "2", "3"];
        let host = MemoryHost::with_config(HostConfig {
            max_retries: u32::MAX,
        });
        for id in ids {
            host.execute(|store| ledger::create_account(store, id, id, 1000, 500))
                .unwrap();
        }
        let before: i128 = host.accounts().iter().map(Account::total).sum();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let host = &host;
                scope.spawn(move || {
                    for i in 0..200 {
                        let dest = ids[(t + i) % ids.len()];
                        let source = ids[(t + i + 1) % ids.len()];
                        if i % 5 == 0 {
                            host.execute(|store| ledger::amalgamate(store, dest, source))
                                .unwrap();
                        } else {
                            host.execute(|store| ledger::send_payment(store, 3, dest, source))
                                .unwrap();
                        }
                    }
                });
            }
        });

        let after: i128 = host.accounts().iter().map(Account::total).sum();
        assert_eq!(before, after);
    }
}
