//! Error types for the SmallBank ledger.
//!
//! Messages keep the category prefixes callers match on (`Wrong arguments of
//! function`, `Could not find specified account`, `System exception`, ...).

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while invoking a ledger operation.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The invoked function name is not a ledger operation
    #[error("Unknown function {0}")]
    UnknownFunction(String),

    /// Wrong argument count or an argument that does not parse
    #[error("Wrong arguments of function {function}: {reason}")]
    BadArguments {
        function: &'static str,
        reason: String,
    },

    /// Referenced account has no stored record
    #[error("Could not find specified account {0}")]
    NotFound(String),

    /// The store rejected a write
    #[error("Failed to put state: {0}")]
    StoreWriteFailed(String),

    /// The store failed on read, or a record could not be encoded
    #[error("System exception: {0}")]
    System(String),

    /// A balance transition would leave the `i64` range
    #[error("Balance overflow on account {id}")]
    Overflow { id: String },

    /// A value read during the invocation changed before commit
    #[error("MVCC read conflict on key {key}")]
    Conflict { key: String },

    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: smallbank <invocations.csv>")]
    MissingArgument,

    /// `SMALLBANK_WORKERS` is not a positive integer
    #[error("Invalid value {0:?} for SMALLBANK_WORKERS")]
    InvalidWorkers(String),
}

impl LedgerError {
    /// Shorthand for [`LedgerError::BadArguments`].
    pub fn bad_arguments(function: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::BadArguments {
            function,
            reason: reason.into(),
        }
    }

    /// Renders the error as the `{"error": "<message>"}` payload returned to callers.
    pub fn payload(&self) -> String {
        serde_json::json!({ "error": self.to_string() }).to_string()
    }

    /// Only read conflicts are worth re-running; everything else fails the same way twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }

    /// Store-level failures, as opposed to problems with the caller's input.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            LedgerError::StoreWriteFailed(_)
                | LedgerError::System(_)
                | LedgerError::Conflict { .. }
        )
    }
}
