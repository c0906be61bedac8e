//! Storage key derivation.
//!
//! Every key written by the ledger is `<namespace><account id>`, where the
//! namespace is the first 6 lower-case hex characters of the SHA-512 digest of
//! a fixed domain string. This keeps ledger records apart from unrelated data
//! sharing the same key-value space.

use sha2::{Digest, Sha512};
use std::sync::OnceLock;

/// Domain string the default namespace is derived from.
pub const DOMAIN: &str = "smallbank";

/// Number of hex characters kept from the digest.
pub const PREFIX_LEN: usize = 6;

static SMALLBANK: OnceLock<Namespace> = OnceLock::new();

/// A fixed key prefix scoping account records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Derives the namespace for `domain`.
    pub fn derive(domain: &str) -> Self {
        let digest = Sha512::digest(domain.as_bytes());
        let mut prefix = hex::encode(digest);
        prefix.truncate(PREFIX_LEN);
        Namespace(prefix)
    }

    /// The process-wide namespace for [`DOMAIN`], computed on first use.
    pub fn smallbank() -> &'static Namespace {
        SMALLBANK.get_or_init(|| Namespace::derive(DOMAIN))
    }

    pub fn prefix(&self) -> &str {
        &self.0
    }

    /// Builds the storage key for an account id.
    pub fn derive_key(&self, id: &str) -> String {
        let mut key = String::with_capacity(self.0.len() + id.len());
        key.push_str(&self.0);
        key.push_str(id);
        key
    }
}
