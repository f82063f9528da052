//! Per-player controllers of the three mini-games.
//!
//! Controllers keep each player's progress in the room slot, score answers
//! with the rule sets from [`crate::scoring`] and hand the final result to
//! [`Room::submit`] once per round. Everything runs inside the room
//! transaction so a player's answers are applied one at a time.

/// Encryption puzzle controller.
pub mod encryption;
/// Network-defense quiz controller.
pub mod network;
/// Password challenge controller.
pub mod password;

use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    dto::play::ChallengeView,
    error::ServiceError,
    scoring::{GameType, MiniGame, seconds_left},
    state::{SharedState, room::Room, round::RoundStatus},
};

/// What a player currently sees in the running round.
pub async fn current_challenge(
    state: &SharedState,
    room_id: Uuid,
    player_id: &str,
) -> Result<ChallengeView, ServiceError> {
    let room = state.load_room(room_id).await?;
    let submitted = room.player(player_id)?.has_submitted;
    let round = ActiveRound::of(&room, None)?;
    let slot = state.room_slot(room_id);
    let config = state.config();
    let now = SystemTime::now();

    match round.game_type {
        GameType::Password => Ok(password::challenge(
            config.password_game(),
            &round,
            slot.progress(player_id, round.number),
            submitted,
            now,
        )),
        GameType::Network => Ok(network::challenge(
            config.network_game(),
            &round,
            slot.progress(player_id, round.number),
            submitted,
            now,
        )),
        GameType::Encryption => encryption::challenge(
            config.encryption_game(),
            &round,
            slot.progress(player_id, round.number),
            submitted,
            now,
        ),
    }
}

/// The round a controller acts on.
pub(crate) struct ActiveRound {
    pub(crate) game_type: GameType,
    pub(crate) number: u32,
    pub(crate) start_time: SystemTime,
}

impl ActiveRound {
    /// The running round of `room`, optionally requiring a specific mini-game.
    pub(crate) fn of(room: &Room, expected: Option<GameType>) -> Result<Self, ServiceError> {
        let state = &room.game_state;
        let (RoundStatus::Playing, Some(game_type), Some(start_time)) =
            (state.status, state.game_type, state.start_time)
        else {
            return Err(ServiceError::InvalidState(
                "no round is currently being played".into(),
            ));
        };
        if let Some(expected) = expected.filter(|expected| *expected != game_type) {
            return Err(ServiceError::InvalidState(format!(
                "the current round plays {game_type}, not {expected}"
            )));
        }
        Ok(Self {
            game_type,
            number: state.round,
            start_time,
        })
    }

    /// Seconds left on the round clock of `game`.
    pub(crate) fn time_left(&self, game: &impl MiniGame, now: SystemTime) -> u32 {
        let elapsed = now.duration_since(self.start_time).unwrap_or_default();
        seconds_left(game.round_duration(), elapsed)
    }
}

/// Reject plays once the round deadline has passed; expiry takes over from there.
pub(crate) fn ensure_before_deadline(room: &Room, now: SystemTime) -> Result<(), ServiceError> {
    if room.deadline_passed(now) {
        Err(ServiceError::InvalidState("round time is up".into()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, services::test_support::playing_room};

    #[tokio::test]
    async fn challenge_matches_the_running_game() {
        let (state, room_id, creator, _) =
            playing_room(AppConfig::default(), GameType::Network).await;
        match current_challenge(&state, room_id, &creator).await.unwrap() {
            ChallengeView::Network {
                question, score, ..
            } => {
                assert_eq!(question.unwrap().index, 0);
                assert_eq!(score, 0);
            }
            other => panic!("unexpected challenge {other:?}"),
        }
    }

    #[tokio::test]
    async fn challenge_requires_membership_and_a_round() {
        let (state, room_id, creator, _) =
            playing_room(AppConfig::default(), GameType::Password).await;
        let err = current_challenge(&state, room_id, "stranger").await.unwrap_err();
        assert!(matches!(err, ServiceError::PlayerNotInRoom(_)));

        let room = state.load_room(room_id).await.unwrap();
        assert!(ActiveRound::of(&room, Some(GameType::Encryption)).is_err());
        assert!(ActiveRound::of(&room, Some(GameType::Password)).is_ok());
        assert!(current_challenge(&state, room_id, &creator).await.is_ok());
    }
}
