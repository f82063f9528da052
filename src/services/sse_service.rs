use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{models::RoomEntity, room_store::RoomChange},
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::sse_events::{self, EVENT_ROOM_SNAPSHOT, EVENT_ROOM_UPDATED},
    state::{SharedState, room::Room},
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Subscribe to the lobby feed, greeting the new client with a handshake.
pub fn lobby_stream(
    state: &SharedState,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let receiver = state.lobby().subscribe();
    let greeting = ServerEvent::json(
        Some("info".to_string()),
        &Handshake {
            stream: "lobby".into(),
            message: "lobby stream connected".into(),
            degraded: state.is_degraded(),
        },
    )
    .ok();
    info!("new lobby SSE connection");
    to_sse_stream(receiver, greeting)
}

/// Subscribe to one room's feed as an SSE response.
///
/// Takes the state handle by value so the stream borrows nothing from the caller.
pub async fn room_stream(
    state: SharedState,
    room_id: Uuid,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let events = room_events(state, room_id).await?;
    let events = events.map(|event| Ok::<_, Infallible>(to_event(event)));
    Ok(Sse::new(events).keep_alive(keep_alive()))
}

/// Events of one room's feed.
///
/// The current room is sent first as `room.snapshot`; every later commit
/// follows as `room.updated` in version order. The stream ends after
/// `room.deleted`.
pub async fn room_events(
    state: SharedState,
    room_id: Uuid,
) -> Result<impl Stream<Item = ServerEvent>, ServiceError> {
    let store = state.require_room_store().await?;
    // Subscribe before reading so no commit falls between snapshot and feed.
    let mut changes = store.subscribe(room_id);
    let snapshot = store
        .find_room(room_id)
        .await?
        .map(with_round_summary)
        .ok_or(ServiceError::RoomNotFound(room_id))?;
    info!(room_id = %room_id, "new room SSE connection");

    Ok(stream! {
        let mut last_version = snapshot.version;
        let mut last_history = snapshot.game_state.round_history.len();
        if let Some(event) = sse_events::room_event(EVENT_ROOM_SNAPSHOT, &snapshot) {
            yield event;
        }
        loop {
            match changes.recv().await {
                Ok(RoomChange::Updated(entity)) => {
                    let room = with_round_summary(*entity);
                    let history = room.game_state.round_history.len();
                    // A history write republishes the version it belongs to.
                    let newer = room.version > last_version
                        || (room.version == last_version && history > last_history);
                    if !newer {
                        continue;
                    }
                    last_version = room.version;
                    last_history = history;
                    if let Some(event) = sse_events::room_event(EVENT_ROOM_UPDATED, &room) {
                        yield event;
                    }
                }
                Ok(RoomChange::Deleted(id)) => {
                    if let Some(event) = sse_events::room_deleted_event(id) {
                        yield event;
                    }
                    break;
                }
                // Every update carries the whole room, so skipped ones are covered by the next.
                Err(RecvError::Lagged(skipped)) => {
                    debug!(room_id = %room_id, skipped, "room SSE subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(room_id = %room_id, "room SSE stream finished");
    })
}

/// A stored room, with the summary of a finished round whose history write
/// has not landed yet.
fn with_round_summary(entity: RoomEntity) -> Room {
    let mut room = Room::from(entity);
    if let Some(summary) = room.missing_round_summary() {
        room.game_state.round_history.push(summary);
    }
    room
}

/// Convert a broadcast receiver into an SSE response, forwarding events
/// until the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    greeting: Option<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(greeting) = greeting {
            if tx.send(Ok(to_event(greeting))).await.is_err() {
                return;
            }
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Skip lagged messages but keep the stream alive.
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
        info!("lobby SSE stream disconnected");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(keep_alive())
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(KEEP_ALIVE_INTERVAL)
        .text("keep-alive")
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::play::PasswordSubmission,
        scoring::GameType,
        services::{
            minigame::password::submit_password,
            room_service,
            sse_events::EVENT_ROOM_DELETED,
            test_support::playing_room,
        },
        state::AppState,
    };

    async fn next_event(
        events: &mut (impl Stream<Item = ServerEvent> + Unpin),
    ) -> Option<(String, Value)> {
        let event = timeout(Duration::from_secs(2), events.next())
            .await
            .expect("room feed stalled")?;
        let data = serde_json::from_str(&event.data).unwrap();
        Some((event.event.unwrap_or_default(), data))
    }

    #[tokio::test]
    async fn room_feed_follows_commits_until_deletion() {
        let (state, room_id, creator, guest) =
            playing_room(AppConfig::default(), GameType::Password).await;
        let mut events = Box::pin(room_events(state.clone(), room_id).await.unwrap());

        let (name, snapshot) = next_event(&mut events).await.unwrap();
        assert_eq!(name, EVENT_ROOM_SNAPSHOT);
        assert_eq!(snapshot["game_state"]["status"], "playing");
        let mut last_version = snapshot["version"].as_u64().unwrap();

        for player_id in [&creator, &guest] {
            submit_password(
                &state,
                room_id,
                PasswordSubmission {
                    player_id: player_id.clone(),
                    password: "Rubik@Monday1+2=3".into(),
                },
            )
            .await
            .unwrap();
        }

        let round_end = loop {
            let (name, room) = next_event(&mut events).await.unwrap();
            assert_eq!(name, EVENT_ROOM_UPDATED);
            let version = room["version"].as_u64().unwrap();
            assert!(version > last_version, "version {version} after {last_version}");
            last_version = version;
            if room["game_state"]["status"] == "round_end" {
                break room;
            }
        };
        let history = round_end["game_state"]["round_history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["round"], 1);

        room_service::delete_room(&state, room_id).await.unwrap();
        let (name, deleted) = next_event(&mut events).await.unwrap();
        assert_eq!(name, EVENT_ROOM_DELETED);
        assert_eq!(deleted["room_id"], room_id.to_string());
        assert!(next_event(&mut events).await.is_none());
    }

    #[tokio::test]
    async fn lobby_stream_outlives_the_state_borrow() {
        let response = {
            let state = AppState::new(AppConfig::default());
            lobby_stream(&state)
        };
        drop(response);
    }

    #[tokio::test]
    async fn unknown_room_has_no_feed() {
        let (state, _, _, _) = playing_room(AppConfig::default(), GameType::Password).await;
        let err = room_events(state, Uuid::new_v4()).await.err().unwrap();
        assert!(matches!(err, ServiceError::RoomNotFound(_)));
    }
}
