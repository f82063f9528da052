use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable context.
        message: String,
        /// Backend specific failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The stored room no longer carries the version the writer read.
    #[error("room {id} was modified concurrently (expected version {expected})")]
    Conflict {
        /// Room that failed the compare-and-swap.
        id: Uuid,
        /// Version the writer based its update on.
        expected: u64,
    },
    /// The room targeted by an update does not exist.
    #[error("room {id} does not exist")]
    Missing {
        /// Room that was not found.
        id: Uuid,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
