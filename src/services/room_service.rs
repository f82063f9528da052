use std::time::{Duration, SystemTime};

use rand::Rng;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::room::{
        CreateRoomRequest, ExpireRoundResponse, JoinRoomRequest, JoinRoomResponse,
        ResetRoundRequest, RoomListItem, RoomView, SessionResponse, StartRoundRequest,
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        room::{PlayerId, Room},
        round::RoundStatus,
    },
};

const PLAYER_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PLAYER_ID_LEN: usize = 9;
/// Slack added to the deadline so the timer never fires a hair too early.
const DEADLINE_GRACE: Duration = Duration::from_millis(50);

/// Lobby listing, newest rooms first.
pub async fn list_rooms(state: &SharedState) -> Result<Vec<RoomListItem>, ServiceError> {
    let store = state.require_room_store().await?;
    let rooms = store.list_rooms().await?;
    Ok(rooms.into_iter().map(RoomListItem::from).collect())
}

/// Open an empty room. Its first joiner becomes the creator.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomView, ServiceError> {
    let store = state.require_room_store().await?;
    let room = Room::new(
        request.name.trim().to_owned(),
        request.password,
        SystemTime::now(),
    );
    store.create_room(room.clone().into()).await?;

    info!(room_id = %room.id, name = %room.name, "room created");
    sse_events::broadcast_room_created(state, &room);
    Ok(RoomView::from(&room))
}

/// Committed snapshot of a room.
pub async fn get_room(state: &SharedState, room_id: Uuid) -> Result<RoomView, ServiceError> {
    let room = state.load_room(room_id).await?;
    Ok(RoomView::from(&room))
}

/// Administrative removal of a room and its history.
pub async fn delete_room(state: &SharedState, room_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_room_store().await?;
    if !store.delete_room(room_id).await? {
        return Err(ServiceError::RoomNotFound(room_id));
    }
    state.drop_room_slot(room_id).await;

    info!(room_id = %room_id, "room deleted");
    sse_events::broadcast_room_deleted(state, room_id);
    Ok(())
}

/// Add a player to a room, making them creator when the room is empty.
pub async fn join_room(
    state: &SharedState,
    room_id: Uuid,
    request: JoinRoomRequest,
) -> Result<JoinRoomResponse, ServiceError> {
    let player_id = generate_player_id();
    let name = request.name.trim().to_owned();
    let password = request.password;

    let ((), room) = state
        .run_room_transaction(room_id, |room, _| {
            room.join(player_id.clone(), name, &password, SystemTime::now())?;
            Ok(())
        })
        .await?;

    let is_creator = room.is_creator(&player_id);
    info!(
        room_id = %room_id,
        player_id = %player_id,
        is_creator,
        players = room.players.len(),
        "player joined"
    );
    announce(state, &room);

    Ok(JoinRoomResponse {
        player_id,
        is_creator,
        room: RoomView::from(&room),
    })
}

/// Check a stored player id against the room, e.g. after a page reload.
pub async fn resume_session(
    state: &SharedState,
    room_id: Uuid,
    player_id: &str,
) -> Result<SessionResponse, ServiceError> {
    let room = state.load_room(room_id).await?;
    let player = room.player(player_id)?;
    Ok(SessionResponse {
        player: player.into(),
        is_creator: room.is_creator(player_id),
        room: RoomView::from(&room),
    })
}

/// Start a round of the requested mini-game. Creator only.
pub async fn start_round(
    state: &SharedState,
    room_id: Uuid,
    request: StartRoundRequest,
) -> Result<RoomView, ServiceError> {
    let game_type = request.game_type;
    let duration = state.config().round_duration(game_type);

    let ((), room) = state
        .run_room_transaction(room_id, |room, draft| {
            room.start_round(&request.player_id, game_type, duration, SystemTime::now())?;
            draft.clear_progress();
            Ok(())
        })
        .await?;

    let round = room.game_state.round;
    let slot = state.room_slot(room_id);
    slot.cancel_reset_timer().await;
    if let Some(deadline) = room.game_state.deadline {
        let timer = spawn_deadline_timer(state.clone(), room_id, round, deadline);
        slot.replace_deadline_timer(timer).await;
    }

    info!(
        room_id = %room_id,
        round,
        game_type = %game_type,
        duration_secs = duration.as_secs(),
        "round started"
    );
    announce(state, &room);
    Ok(RoomView::from(&room))
}

/// Creator-triggered return to the lobby. A room already waiting is left alone.
pub async fn reset_round(
    state: &SharedState,
    room_id: Uuid,
    request: ResetRoundRequest,
) -> Result<RoomView, ServiceError> {
    let (reset, room) = state
        .run_room_transaction(room_id, |room, draft| {
            let reset = room.reset_round_by(&request.player_id)?;
            if reset {
                draft.clear_progress();
            }
            Ok(reset)
        })
        .await?;

    if reset {
        state.room_slot(room_id).cancel_reset_timer().await;
        info!(room_id = %room_id, round = room.game_state.round, "round reset by creator");
        announce(state, &room);
    } else {
        debug!(room_id = %room_id, "reset ignored; room already waiting");
    }
    Ok(RoomView::from(&room))
}

/// Assert that the round time is up and submit every outstanding player.
pub async fn expire_round(
    state: &SharedState,
    room_id: Uuid,
) -> Result<ExpireRoundResponse, ServiceError> {
    let (auto_submitted, room) = expire(state, room_id, None).await?;
    Ok(ExpireRoundResponse {
        auto_submitted,
        room: RoomView::from(&room),
    })
}

/// Follow-up of a committed transaction made by a mini-game controller.
pub(crate) async fn round_committed(state: &SharedState, room: &Room, round_ended: bool) {
    if round_ended {
        on_round_end(state, room).await;
    }
    announce(state, room);
}

async fn expire(
    state: &SharedState,
    room_id: Uuid,
    expected_round: Option<u32>,
) -> Result<(Vec<PlayerId>, Room), ServiceError> {
    let (submitted, room) = state
        .run_room_transaction(room_id, |room, draft| {
            let round = room.game_state.round;
            if expected_round.is_some_and(|expected| expected != round) {
                return Ok(Vec::new());
            }
            let submitted = room.expire_round(SystemTime::now(), |player| {
                draft.partial_card(player, round)
            })?;
            Ok(submitted)
        })
        .await?;

    if submitted.is_empty() {
        debug!(room_id = %room_id, "expiry had nothing to submit");
    } else {
        info!(
            room_id = %room_id,
            round = room.game_state.round,
            auto_submitted = submitted.len(),
            "round deadline reached"
        );
        round_committed(state, &room, true).await;
    }
    Ok((submitted, room))
}

async fn on_round_end(state: &SharedState, room: &Room) {
    let round = room.game_state.round;
    let winners = room
        .game_state
        .round_history
        .last()
        .map(|summary| summary.winners.join(","))
        .unwrap_or_default();
    info!(room_id = %room.id, round, winners = %winners, "round ended");

    if room.game_state.status == RoundStatus::RoundEnd {
        let delay = state.config().auto_reset_delay();
        let timer = spawn_reset_timer(state.clone(), room.id, round, delay);
        state.room_slot(room.id).replace_reset_timer(timer).await;
    }
}

fn announce(state: &SharedState, room: &Room) {
    sse_events::broadcast_room_updated(state, room);
}

fn spawn_deadline_timer(
    state: SharedState,
    room_id: Uuid,
    round: u32,
    deadline: SystemTime,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let wait = deadline
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        sleep(wait + DEADLINE_GRACE).await;

        if let Err(err) = expire(&state, room_id, Some(round)).await {
            warn!(room_id = %room_id, round, error = %err, "deadline timer failed to expire round");
        }
    })
}

fn spawn_reset_timer(
    state: SharedState,
    room_id: Uuid,
    round: u32,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;

        let result = state
            .run_room_transaction(room_id, |room, draft| {
                if room.game_state.round != round {
                    return Ok(false);
                }
                let reset = room.reset_round()?;
                if reset {
                    draft.clear_progress();
                }
                Ok(reset)
            })
            .await;

        match result {
            Ok((true, room)) => {
                info!(room_id = %room_id, round = room.game_state.round, "round reset automatically");
                announce(&state, &room);
            }
            Ok((false, _)) => debug!(room_id = %room_id, round, "auto-reset skipped"),
            Err(err) => warn!(room_id = %room_id, round, error = %err, "auto-reset failed"),
        }
    })
}

fn generate_player_id() -> PlayerId {
    let mut rng = rand::rng();
    (0..PLAYER_ID_LEN)
        .map(|_| char::from(PLAYER_ID_ALPHABET[rng.random_range(0..PLAYER_ID_ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::RoomStore,
        dto::play::PasswordSubmission,
        scoring::GameType,
        services::{
            minigame::password::submit_password,
            test_support::{
                FlakyRoomStore, join, playing_room_on, state_with_config, state_with_room,
            },
        },
        state::room::MAX_PLAYERS,
    };

    #[test]
    fn player_ids_are_nine_lowercase_alphanumerics() {
        let id = generate_player_id();
        assert_eq!(id.len(), 9);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[tokio::test]
    async fn first_joiner_becomes_creator() {
        let (state, room_id) = state_with_room().await;
        let first = join(&state, room_id, "Ada").await;
        let second = join(&state, room_id, "Linus").await;
        assert!(first.is_creator);
        assert!(!second.is_creator);
        assert_eq!(
            second.room.creator_id.as_deref(),
            Some(first.player_id.as_str())
        );
    }

    #[tokio::test]
    async fn concurrent_joins_elect_exactly_one_creator() {
        let (state, room_id) = state_with_room().await;
        let tasks: Vec<_> = (0..MAX_PLAYERS)
            .map(|i| {
                let state = state.clone();
                tokio::spawn(async move {
                    join_room(
                        &state,
                        room_id,
                        JoinRoomRequest {
                            name: format!("player {i}"),
                            password: "pw".into(),
                        },
                    )
                    .await
                })
            })
            .collect();

        let mut creators = 0;
        let mut ids = HashSet::new();
        for task in tasks {
            let response = task.await.unwrap().unwrap();
            creators += usize::from(response.is_creator);
            ids.insert(response.player_id);
        }
        assert_eq!(creators, 1);
        assert_eq!(ids.len(), MAX_PLAYERS);

        let room = state.load_room(room_id).await.unwrap();
        assert_eq!(room.players.len(), MAX_PLAYERS);
        assert_eq!(room.version, MAX_PLAYERS as u64);
    }

    #[tokio::test]
    async fn ninth_player_is_turned_away() {
        let (state, room_id) = state_with_room().await;
        for i in 0..MAX_PLAYERS {
            join(&state, room_id, &format!("p{i}")).await;
        }
        let err = join_room(
            &state,
            room_id,
            JoinRoomRequest {
                name: "late".into(),
                password: "pw".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::RoomFull { max: 8 }));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_room_are_rejected() {
        let (state, room_id) = state_with_room().await;
        let err = join_room(
            &state,
            room_id,
            JoinRoomRequest {
                name: "Eve".into(),
                password: "guess".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::IncorrectPassword));

        let err = get_room(&state, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "room_not_found");
    }

    #[tokio::test]
    async fn only_the_creator_starts_and_needs_company() {
        let (state, room_id) = state_with_room().await;
        let creator = join(&state, room_id, "Ada").await;

        let err = start_round(
            &state,
            room_id,
            StartRoundRequest {
                player_id: creator.player_id.clone(),
                game_type: GameType::Password,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientPlayers { .. }));

        let guest = join(&state, room_id, "Linus").await;
        let before = state.load_room(room_id).await.unwrap();
        let err = start_round(
            &state,
            room_id,
            StartRoundRequest {
                player_id: guest.player_id,
                game_type: GameType::Password,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));
        assert_eq!(state.load_room(room_id).await.unwrap(), before);

        let view = start_round(
            &state,
            room_id,
            StartRoundRequest {
                player_id: creator.player_id,
                game_type: GameType::Password,
            },
        )
        .await
        .unwrap();
        assert_eq!(view.game_state.status, RoundStatus::Playing);
        assert_eq!(view.game_state.round, 1);
        assert!(view.game_state.deadline.is_some());
    }

    #[tokio::test]
    async fn early_expiry_is_refused() {
        let (state, room_id) = state_with_room().await;
        let creator = join(&state, room_id, "Ada").await;
        join(&state, room_id, "Linus").await;
        start_round(
            &state,
            room_id,
            StartRoundRequest {
                player_id: creator.player_id,
                game_type: GameType::Encryption,
            },
        )
        .await
        .unwrap();

        let err = expire_round(&state, room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn deadline_timer_expires_then_room_resets() {
        let config = AppConfig::from_json_str(
            r#"{ "password_round_secs": 0, "auto_reset_delay_ms": 100 }"#,
        )
        .unwrap();
        let (state, room_id) = state_with_config(config).await;
        let creator = join(&state, room_id, "Ada").await;
        join(&state, room_id, "Linus").await;
        start_round(
            &state,
            room_id,
            StartRoundRequest {
                player_id: creator.player_id,
                game_type: GameType::Password,
            },
        )
        .await
        .unwrap();

        sleep(Duration::from_millis(300)).await;
        let room = state.load_room(room_id).await.unwrap();
        let last = room.game_state.round_history.last().unwrap();
        assert_eq!(last.round, 1);
        assert_eq!(last.scores.len(), 2);
        assert!(last.scores.values().all(|score| score.total == 0));

        sleep(Duration::from_millis(300)).await;
        let room = state.load_room(room_id).await.unwrap();
        assert_eq!(room.game_state.status, RoundStatus::Waiting);
        assert_eq!(room.game_state.round, 2);
        assert!(!room.all_submitted);
    }

    #[tokio::test]
    async fn expiry_outside_a_round_is_a_no_op() {
        let (state, room_id) = state_with_room().await;
        join(&state, room_id, "Ada").await;
        let response = expire_round(&state, room_id).await.unwrap();
        assert!(response.auto_submitted.is_empty());
        assert_eq!(response.room.version, 1);
    }

    #[tokio::test]
    async fn deleted_rooms_disappear_from_the_lobby() {
        let (state, room_id) = state_with_room().await;
        assert_eq!(list_rooms(&state).await.unwrap().len(), 1);
        delete_room(&state, room_id).await.unwrap();
        assert!(list_rooms(&state).await.unwrap().is_empty());
        let err = delete_room(&state, room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn resume_reports_missing_players() {
        let (state, room_id) = state_with_room().await;
        let ada = join(&state, room_id, "Ada").await;
        let session = resume_session(&state, room_id, &ada.player_id).await.unwrap();
        assert!(session.is_creator);
        let err = resume_session(&state, room_id, "nobody").await.unwrap_err();
        assert_eq!(err.code(), "player_not_in_room");
    }

    #[tokio::test]
    async fn unknown_rooms_leave_no_slot_behind() {
        let (state, _) = state_with_room().await;
        let before = state.active_rooms();
        for _ in 0..100 {
            let err = join_room(
                &state,
                Uuid::new_v4(),
                JoinRoomRequest {
                    name: "Eve".into(),
                    password: "pw".into(),
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ServiceError::RoomNotFound(_)));
        }
        assert_eq!(state.active_rooms(), before);
    }

    #[tokio::test]
    async fn lost_history_write_is_restored_by_the_next_transaction() {
        let store = Arc::new(FlakyRoomStore::default());
        let (state, room_id, creator, guest) =
            playing_room_on(AppConfig::default(), store.clone(), GameType::Password).await;

        store.fail_appends(1);
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

        let stored = store.find_room(room_id).await.unwrap().unwrap();
        assert_eq!(stored.game_state.status, RoundStatus::RoundEnd);
        assert!(stored.game_state.round_history.is_empty());
        // Readers already see the finished round.
        let loaded = state.load_room(room_id).await.unwrap();
        assert_eq!(loaded.game_state.round_history.len(), 1);

        reset_round(
            &state,
            room_id,
            ResetRoundRequest {
                player_id: creator.clone(),
            },
        )
        .await
        .unwrap();

        let stored = store.find_room(room_id).await.unwrap().unwrap();
        assert_eq!(stored.game_state.round, 2);
        let rounds: Vec<u32> = stored
            .game_state
            .round_history
            .iter()
            .map(|summary| summary.round)
            .collect();
        assert_eq!(rounds, vec![1]);
        assert_eq!(stored.game_state.round_history[0].scores.len(), 2);
    }
}
