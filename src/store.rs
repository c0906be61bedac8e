//! Account store over a raw key-value backend.
//!
//! [`KvStore`] is the seam to whatever holds the bytes; [`AccountStore`] owns
//! key derivation and the record codec on top of it. Neither locks anything:
//! atomicity of one invocation comes from the backend (see [`crate::host`]).

use crate::account::Account;
use crate::error::{LedgerError, Result};
use crate::keys::Namespace;
use log::warn;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failures reported by a key-value backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),

    #[error("MVCC read conflict on key {key}")]
    Conflict { key: String },
}

/// Raw byte storage addressed by string keys.
///
/// Reads take `&mut self` because transactional backends record what was read.
pub trait KvStore {
    fn get_state(&mut self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError>;
}

impl KvStore for BTreeMap<String, Vec<u8>> {
    fn get_state(&mut self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        Ok(self.get(key).cloned())
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError> {
        self.insert(key.to_string(), value);
        Ok(())
    }
}

/// Maps account ids to stored records under a namespace.
pub struct AccountStore<S> {
    backend: S,
    namespace: Namespace,
}

impl<S: KvStore> AccountStore<S> {
    /// Creates a store scoped to the process-wide SmallBank namespace.
    pub fn new(backend: S) -> Self {
        Self::with_namespace(backend, Namespace::smallbank().clone())
    }

    pub fn with_namespace(backend: S, namespace: Namespace) -> Self {
        AccountStore { backend, namespace }
    }

    /// Loads the account stored for `id`.
    ///
    /// A missing key and bytes that do not decode as an [`Account`] both
    /// surface as [`LedgerError::NotFound`].
    pub fn get(&mut self, id: &str) -> Result<Account> {
        let key = self.namespace.derive_key(id);
        let bytes = match self.backend.get_state(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(LedgerError::NotFound(id.to_string())),
            Err(StoreError::Conflict { key }) => return Err(LedgerError::Conflict { key }),
            Err(StoreError::Backend(msg)) => return Err(LedgerError::System(msg)),
        };

        Account::decode(&bytes).map_err(|e| {
            warn!("Record at key {} does not decode as an account: {}", key, e);
            LedgerError::NotFound(id.to_string())
        })
    }

    /// Writes `account` at its derived key, replacing any existing record.
    pub fn put(&mut self, account: &Account) -> Result<()> {
        let key = self.namespace.derive_key(&account.id);
        let bytes = account
            .encode()
            .map_err(|e| LedgerError::System(e.to_string()))?;

        self.backend
            .put_state(&key, bytes)
            .map_err(|e| LedgerError::StoreWriteFailed(e.to_string()))
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_inner(self) -> S {
        self.backend
    }
}
