/// Database model definitions.
pub mod models;
/// Room persistence backends and the change feed.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
