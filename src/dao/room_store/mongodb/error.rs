use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB room store operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB room store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required environment variable is not set.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver client could not be built.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server did not answer the ping sent right after connecting.
    #[error("MongoDB database `{database}` did not answer the initial ping")]
    InitialPing {
        /// Database that was pinged.
        database: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index description.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a room failed.
    #[error("failed to save room `{id}`")]
    SaveRoom {
        /// Room id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a room failed.
    #[error("failed to load room `{id}`")]
    LoadRoom {
        /// Room id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Appending to a room's round history failed.
    #[error("failed to append round {round} to room `{id}`")]
    AppendHistory {
        /// Room id.
        id: Uuid,
        /// Round counter of the entry.
        round: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Deleting a room failed.
    #[error("failed to delete room `{id}`")]
    DeleteRoom {
        /// Room id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing rooms failed.
    #[error("failed to list rooms")]
    ListRooms {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A stored document could not be mapped back to a room.
    #[error("stored room document `{id}` is malformed")]
    MalformedDocument {
        /// Raw document id.
        id: String,
    },
}
