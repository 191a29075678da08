//! Error types for the bytegraph core library.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error enum for the extraction core and the storage drivers.
#[derive(Debug, Error)]
pub enum CpgError {
    /// An edge was attempted between node kinds the schema forbids.
    #[error("schema violation: no {edge} edge is allowed from {src} to {dst}")]
    SchemaViolation {
        src: &'static str,
        edge: &'static str,
        dst: &'static str,
    },

    /// A node reached the driver without a property the schema requires.
    #[error("schema violation: {kind} node is missing required property '{property}'")]
    MissingProperty {
        kind: &'static str,
        property: &'static str,
    },

    /// The source compiler (or the IR lifter it feeds) failed.
    #[error("compilation failed: {message}")]
    Compile { message: String },

    /// A storage back-end could not be reached or refused the operation.
    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    /// A requested input file does not exist.
    #[error("missing input: {}", path.display())]
    MissingInput { path: PathBuf },

    /// A call-graph edge references a method whose body is unknown.
    ///
    /// Recovered locally by emitting a phantom method head; never surfaced
    /// to callers of `project()`.
    #[error("call target {full_name}:{signature} has no body in the store")]
    PhantomTarget {
        full_name: String,
        signature: String,
    },

    /// Configuration that cannot be honoured (e.g. SPARK without an oracle).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T, E = CpgError> = std::result::Result<T, E>;

macro_rules! storage_from {
    ($($ty:ty),+ $(,)?) => {
        $(impl From<$ty> for CpgError {
            fn from(err: $ty) -> Self {
                CpgError::Storage(err.to_string())
            }
        })+
    };
}

storage_from!(
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// Failing to open the database at all means the back-end cannot be
// reached, which is its own category for callers that want to retry.
impl From<redb::DatabaseError> for CpgError {
    fn from(err: redb::DatabaseError) -> Self {
        CpgError::DriverUnavailable(err.to_string())
    }
}

impl CpgError {
    /// Whether the pipeline may recover from this error and continue with
    /// the next method (schema problems are local; everything else is not).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CpgError::SchemaViolation { .. }
                | CpgError::MissingProperty { .. }
                | CpgError::PhantomTarget { .. }
        )
    }
}
