#[cfg(feature = "couch-store")]
pub mod couchdb;
/// Change notification fan-out shared by every backend.
pub mod feed;
/// Process-local store, used by default and in tests.
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{RoomEntity, RoomListItemEntity, RoundSummaryEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use feed::{ChangeFeed, RoomChange};

/// Abstraction over the persistence layer for rooms.
pub trait RoomStore: Send + Sync {
    /// Persist a brand new room.
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a room together with its round history.
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Overwrite a room if its stored version still equals `expected_version`.
    ///
    /// The round history is left untouched; use [`RoomStore::append_round_history`].
    fn save_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Append one finished round to a room's history.
    ///
    /// Idempotent per round: writing a round that is already recorded replaces it.
    fn append_round_history(
        &self,
        id: Uuid,
        summary: RoundSummaryEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Lobby listing of every room.
    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>>;
    /// Remove a room; returns whether it existed.
    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Receive every committed change of a room. Dropping the receiver unsubscribes.
    fn subscribe(&self, id: Uuid) -> broadcast::Receiver<RoomChange>;
    /// Probe the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
