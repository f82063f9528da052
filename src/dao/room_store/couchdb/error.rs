//! Error types shared by the CouchDB storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a GET against the target database.
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        /// Database name.
        database: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a database creation request.
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        /// Database name.
        database: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Returned status.
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        /// Document path.
        path: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus {
        /// Document path.
        path: String,
        /// Returned status.
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Document path.
        path: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// Decoding a JSON value into the expected model failed.
    #[error("failed to deserialize CouchDB value for `{path}`")]
    DeserializeValue {
        /// Document path.
        path: String,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Failed to parse a document ID into a room id.
    #[error("invalid document ID `{doc_id}`")]
    InvalidDocId {
        /// Raw document id.
        doc_id: String,
    },
}

impl CouchDaoError {
    /// Whether CouchDB refused a write because the revision is stale.
    pub fn is_revision_conflict(&self) -> bool {
        matches!(
            self,
            CouchDaoError::RequestStatus { status, .. } if *status == StatusCode::CONFLICT
        )
    }
}
