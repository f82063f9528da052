use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        room::{RoomListItem, RoomView},
        sse::{RoomDeletedEvent, ServerEvent, SystemStatus},
    },
    state::{SharedState, SseHub, room::Room},
};

pub(crate) const EVENT_ROOM_SNAPSHOT: &str = "room.snapshot";
pub(crate) const EVENT_ROOM_CREATED: &str = "room.created";
pub(crate) const EVENT_ROOM_UPDATED: &str = "room.updated";
pub(crate) const EVENT_ROOM_DELETED: &str = "room.deleted";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Announce a new room to the lobby.
pub fn broadcast_room_created(state: &SharedState, room: &Room) {
    send_lobby_event(state.lobby(), EVENT_ROOM_CREATED, &RoomListItem::from(room));
}

/// Refresh a room's lobby entry (player count, status, round).
pub fn broadcast_room_updated(state: &SharedState, room: &Room) {
    send_lobby_event(state.lobby(), EVENT_ROOM_UPDATED, &RoomListItem::from(room));
}

/// Remove a room from the lobby.
pub fn broadcast_room_deleted(state: &SharedState, room_id: Uuid) {
    send_lobby_event(state.lobby(), EVENT_ROOM_DELETED, &RoomDeletedEvent { room_id });
}

/// Broadcast a degraded mode change.
pub fn broadcast_system_status(hub: &SseHub, degraded: bool) {
    send_lobby_event(hub, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Serialise a room for its own SSE feed.
pub(crate) fn room_event(event: &str, room: &Room) -> Option<ServerEvent> {
    encode(event, &RoomView::from(room))
}

/// Serialise the deletion notice sent on a room feed.
pub(crate) fn room_deleted_event(room_id: Uuid) -> Option<ServerEvent> {
    encode(EVENT_ROOM_DELETED, &RoomDeletedEvent { room_id })
}

fn send_lobby_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    if let Some(event) = encode(event, payload) {
        hub.broadcast(event);
    }
}

fn encode(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}
