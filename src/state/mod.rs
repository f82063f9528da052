/// Room aggregate and its pure protocols.
pub mod room;
/// Round lifecycle state machine.
pub mod round;
mod slot;

use std::{sync::Arc, time::Duration, time::SystemTime};

use dashmap::DashMap;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{room_store::RoomStore, storage::StorageError},
    dto::sse::ServerEvent,
    error::ServiceError,
    services::sse_events,
    state::room::{Room, RoundSummary},
};

pub use self::slot::{GameProgress, PlayerProgress, ProgressDraft, RoomSlot};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;
/// Upper bound on a single room transaction.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

const LOBBY_CAPACITY: usize = 32;

/// Central application state: the storage handle, per-room slots and the lobby hub.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    lobby: SseHub,
    rooms: DashMap<Uuid, Arc<RoomSlot>>,
    degraded: watch::Sender<bool>,
    transaction_timeout: Option<Duration>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            lobby: SseHub::new(LOBBY_CAPACITY),
            rooms: DashMap::new(),
            degraded: degraded_tx,
            transaction_timeout: Some(DEFAULT_TRANSACTION_TIMEOUT),
            config,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current room store or [`ServiceError::Degraded`].
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag and tell lobby subscribers when it flips.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            sse_events::broadcast_system_status(&self.lobby, value);
        }
    }

    /// Broadcast hub used for the lobby SSE stream.
    pub fn lobby(&self) -> &SseHub {
        &self.lobby
    }

    /// In-memory slot of a room, created on first use.
    pub fn room_slot(&self, room_id: Uuid) -> Arc<RoomSlot> {
        self.rooms.entry(room_id).or_default().clone()
    }

    /// Number of rooms with an in-memory slot.
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Forget a deleted room, stopping its timers.
    pub async fn drop_room_slot(&self, room_id: Uuid) {
        if let Some((_, slot)) = self.rooms.remove(&room_id) {
            slot.cancel_timers().await;
        }
    }

    /// Load the committed state of a room.
    ///
    /// A finished round whose history entry was never written is shown with
    /// its rebuilt summary; the next transaction stores it.
    pub async fn load_room(&self, room_id: Uuid) -> Result<Room, ServiceError> {
        let store = self.require_room_store().await?;
        let mut room = store
            .find_room(room_id)
            .await?
            .map(Room::from)
            .ok_or(ServiceError::RoomNotFound(room_id))?;
        if let Some(summary) = room.missing_round_summary() {
            room.game_state.round_history.push(summary);
        }
        Ok(room)
    }

    /// Apply `mutate` to a room as one serialized, version-checked transaction.
    ///
    /// Transactions on the same room never overlap. When `mutate` leaves the
    /// room unchanged nothing is written. Progress staged by `mutate` reaches
    /// the room slot only once the commit succeeded. Returns the closure's
    /// value and the committed room.
    pub async fn run_room_transaction<T, F>(
        &self,
        room_id: Uuid,
        mutate: F,
    ) -> Result<(T, Room), ServiceError>
    where
        F: FnOnce(&mut Room, &mut ProgressDraft<'_>) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        let store = self.require_room_store().await?;
        let slot = self.room_slot(room_id);
        let _gate = slot.gate.lock().await;

        let mut progress = slot.draft();
        let work = self.commit(store.as_ref(), room_id, &mut progress, mutate);
        let result = match self.transaction_timeout {
            Some(limit) => match timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(room_id = %room_id, "room transaction timed out");
                    Err(ServiceError::Timeout)
                }
            },
            None => work.await,
        };

        let (value, room, appended) = match result {
            Ok(committed) => committed,
            Err(ServiceError::RoomNotFound(id)) => {
                self.rooms
                    .remove_if(&room_id, |_, current| Arc::ptr_eq(current, &slot));
                return Err(ServiceError::RoomNotFound(id));
            }
            Err(err) => return Err(err),
        };
        progress.apply();

        // The room is committed; history is written without a deadline.
        for summary in appended {
            let round = summary.round;
            if let Err(err) = store.append_round_history(room_id, summary.into()).await {
                warn!(
                    room_id = %room_id,
                    round,
                    error = %err,
                    "round history not written; the next transaction restores it"
                );
            }
        }
        Ok((value, room))
    }

    async fn commit<T, F>(
        &self,
        store: &dyn RoomStore,
        room_id: Uuid,
        progress: &mut ProgressDraft<'_>,
        mutate: F,
    ) -> Result<(T, Room, Vec<RoundSummary>), ServiceError>
    where
        F: FnOnce(&mut Room, &mut ProgressDraft<'_>) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        let mut current = store
            .find_room(room_id)
            .await?
            .map(Room::from)
            .ok_or(ServiceError::RoomNotFound(room_id))?;

        if let Some(summary) = current.missing_round_summary() {
            warn!(room_id = %room_id, round = summary.round, "restoring missing round history");
            store
                .append_round_history(room_id, summary.clone().into())
                .await?;
            current.game_state.round_history.push(summary);
        }

        let mut next = current.clone();
        let value = mutate(&mut next, progress)?;
        if next == current {
            debug!(room_id = %room_id, "transaction left the room unchanged; nothing written");
            return Ok((value, current, Vec::new()));
        }

        let committed_at = SystemTime::now();
        next.version = current.version + 1;
        next.updated_at = committed_at;
        // A round ends at the commit that records it.
        let appended: Vec<RoundSummary> = next
            .game_state
            .round_history
            .iter_mut()
            .skip(current.game_state.round_history.len())
            .map(|summary| {
                summary.ended_at = committed_at;
                summary.clone()
            })
            .collect();

        if let Err(err) = store.save_room(next.clone().into(), current.version).await {
            if let StorageError::Conflict { expected, .. } = &err {
                warn!(room_id = %room_id, expected, "rejected concurrent room update");
            }
            return Err(err.into());
        }
        Ok((value, next, appended))
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
