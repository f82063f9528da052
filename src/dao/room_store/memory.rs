use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{RoomEntity, RoomListItemEntity, RoundSummaryEntity},
    room_store::{ChangeFeed, RoomChange, RoomStore},
    storage::{StorageError, StorageResult},
};

/// Room store keeping everything in process memory.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: DashMap<Uuid, RoomEntity>,
    feed: ChangeFeed,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryRoomStore {
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.rooms.insert(room.id, room.clone());
            inner.feed.publish_updated(room);
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.rooms.get(&id).map(|room| room.clone())) })
    }

    fn save_room(
        &self,
        mut room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let id = room.id;
            let committed = match inner.rooms.entry(id) {
                Entry::Vacant(_) => return Err(StorageError::Missing { id }),
                Entry::Occupied(mut stored) => {
                    if stored.get().version != expected_version {
                        return Err(StorageError::Conflict {
                            id,
                            expected: expected_version,
                        });
                    }
                    room.game_state.round_history =
                        stored.get().game_state.round_history.clone();
                    stored.insert(room.clone());
                    room
                }
            };
            inner.feed.publish_updated(committed);
            Ok(())
        })
    }

    fn append_round_history(
        &self,
        id: Uuid,
        summary: RoundSummaryEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let committed = {
                let mut stored = inner
                    .rooms
                    .get_mut(&id)
                    .ok_or(StorageError::Missing { id })?;
                let history = &mut stored.game_state.round_history;
                match history.iter_mut().find(|entry| entry.round == summary.round) {
                    Some(entry) => *entry = summary,
                    None => history.push(summary),
                }
                stored.clone()
            };
            inner.feed.publish_updated(committed);
            Ok(())
        })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut rooms: Vec<RoomListItemEntity> = inner
                .rooms
                .iter()
                .map(|entry| RoomListItemEntity::from(entry.value()))
                .collect();
            rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rooms)
        })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let existed = inner.rooms.remove(&id).is_some();
            if existed {
                inner.feed.publish_deleted(id);
            }
            Ok(existed)
        })
    }

    fn subscribe(&self, id: Uuid) -> broadcast::Receiver<RoomChange> {
        self.inner.feed.subscribe(id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
