/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Pure leaderboard projection.
pub mod leaderboard;
/// Per-player mini-game controllers.
pub mod minigame;
/// Room lifecycle: creation, membership, rounds and timers.
pub mod room_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor.
pub mod storage_supervisor;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use futures::future::BoxFuture;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use crate::{
        config::AppConfig,
        dao::{
            models::{RoomEntity, RoomListItemEntity, RoundSummaryEntity},
            room_store::{RoomChange, RoomStore, memory::MemoryRoomStore},
            storage::{StorageError, StorageResult},
        },
        dto::room::{CreateRoomRequest, JoinRoomRequest, JoinRoomResponse, StartRoundRequest},
        scoring::GameType,
        services::room_service,
        state::{AppState, SharedState},
    };

    /// In-memory store whose next writes can be made to fail.
    #[derive(Default)]
    pub struct FlakyRoomStore {
        inner: MemoryRoomStore,
        failing_saves: AtomicUsize,
        failing_appends: AtomicUsize,
    }

    impl FlakyRoomStore {
        /// Reject the next `count` saves with a version conflict.
        pub fn fail_saves(&self, count: usize) {
            self.failing_saves.store(count, Ordering::SeqCst);
        }

        /// Fail the next `count` history appends as unavailable.
        pub fn fail_appends(&self, count: usize) {
            self.failing_appends.store(count, Ordering::SeqCst);
        }

        fn take(counter: &AtomicUsize) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    impl RoomStore for FlakyRoomStore {
        fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.create_room(room)
        }

        fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.find_room(id)
        }

        fn save_room(
            &self,
            room: RoomEntity,
            expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<()>> {
            if Self::take(&self.failing_saves) {
                let id = room.id;
                return Box::pin(async move {
                    Err(StorageError::Conflict {
                        id,
                        expected: expected_version,
                    })
                });
            }
            self.inner.save_room(room, expected_version)
        }

        fn append_round_history(
            &self,
            id: Uuid,
            summary: RoundSummaryEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            if Self::take(&self.failing_appends) {
                return Box::pin(async {
                    Err(StorageError::unavailable(
                        "history write failed".into(),
                        std::io::Error::other("connection reset"),
                    ))
                });
            }
            self.inner.append_round_history(id, summary)
        }

        fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
            self.inner.list_rooms()
        }

        fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_room(id)
        }

        fn subscribe(&self, id: Uuid) -> broadcast::Receiver<RoomChange> {
            self.inner.subscribe(id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    pub async fn state_with_store(
        config: AppConfig,
        store: Arc<dyn RoomStore>,
    ) -> (SharedState, Uuid) {
        let state = AppState::new(config);
        state.set_room_store(store).await;
        let room = room_service::create_room(
            &state,
            CreateRoomRequest {
                name: "Blue team".into(),
                password: "pw".into(),
            },
        )
        .await
        .unwrap();
        (state, room.id)
    }

    pub async fn state_with_config(config: AppConfig) -> (SharedState, Uuid) {
        state_with_store(config, Arc::new(MemoryRoomStore::new())).await
    }

    pub async fn state_with_room() -> (SharedState, Uuid) {
        state_with_config(AppConfig::default()).await
    }

    pub async fn join(state: &SharedState, room_id: Uuid, name: &str) -> JoinRoomResponse {
        room_service::join_room(
            state,
            room_id,
            JoinRoomRequest {
                name: name.into(),
                password: "pw".into(),
            },
        )
        .await
        .unwrap()
    }

    /// Room with two players and a running round of `game_type`; returns both player ids.
    pub async fn playing_room(
        config: AppConfig,
        game_type: GameType,
    ) -> (SharedState, Uuid, String, String) {
        playing_room_on(config, Arc::new(MemoryRoomStore::new()), game_type).await
    }

    /// [`playing_room`] backed by `store`.
    pub async fn playing_room_on(
        config: AppConfig,
        store: Arc<dyn RoomStore>,
        game_type: GameType,
    ) -> (SharedState, Uuid, String, String) {
        let (state, room_id) = state_with_store(config, store).await;
        let creator = join(&state, room_id, "Ada").await.player_id;
        let guest = join(&state, room_id, "Linus").await.player_id;
        room_service::start_round(
            &state,
            room_id,
            StartRoundRequest {
                player_id: creator.clone(),
                game_type,
            },
        )
        .await
        .unwrap();
        (state, room_id, creator, guest)
    }
}
