//! # SmallBank
//!
//! A minimal ledger state machine: accounts with a checking and a savings
//! balance, and six operations that move value between them. Accounts live in
//! a key-value store under a namespaced key; every invocation runs as one
//! atomic unit against that store.
//!
//! ## Design Principles
//!
//! - **Integer balances**: `i64` everywhere, checked arithmetic, no floats
//! - **Conservation**: `send_payment` and `amalgamate` never change the sum
//!   of all balances; `deposit_checking`, `write_check` and
//!   `transact_savings` change it by exactly their amount
//! - **Strict arguments**: arity and integer parsing are checked before any
//!   store access
//! - **Delegated atomicity**: ledger code never locks; the host commits each
//!   invocation's writes together or not at all
//!
//! ## Example
//!
//! ```
//! use smallbank::{Invocation, SmallbankEngine};
//!
//! let engine = SmallbankEngine::new();
//! engine.invoke(&Invocation::new("create_account", ["A", "Alice", "100", "50"])).unwrap();
//! engine.invoke(&Invocation::new("create_account", ["B", "Bob", "0", "0"])).unwrap();
//! engine.invoke(&Invocation::new("send_payment", ["30", "B", "A"])).unwrap();
//!
//! assert_eq!(engine.account("A").unwrap().checking_balance, 70);
//! assert_eq!(engine.account("B").unwrap().checking_balance, 30);
//! ```

pub mod account;
pub mod engine;
pub mod error;
pub mod host;
pub mod keys;
pub mod ledger;
pub mod operation;
pub mod store;
pub mod workload;

pub use account::Account;
pub use engine::{read_invocations, FunctionStats, RunSummary, SmallbankEngine};
pub use error::{LedgerError, Result};
pub use host::{HostConfig, MemoryHost, TxContext};
pub use keys::Namespace;
pub use operation::{Function, Invocation, Operation};
pub use store::{AccountStore, KvStore, StoreError};
pub use workload::{FunctionMix, HotAccount, Workload, WorkloadConfig, WorkloadError};
