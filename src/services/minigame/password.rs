use std::time::SystemTime;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::play::{ChallengeView, PasswordResult, PasswordSubmission, RequirementView, SubmissionStatus},
    error::ServiceError,
    scoring::{
        GameType, MiniGame,
        password::{PasswordGame, unmet_requirements},
    },
    services::{
        minigame::{ActiveRound, ensure_before_deadline},
        room_service,
    },
    state::{GameProgress, PlayerProgress, SharedState},
};

/// Try a password. It is submitted as soon as it meets every requirement.
pub async fn submit_password(
    state: &SharedState,
    room_id: Uuid,
    submission: PasswordSubmission,
) -> Result<PasswordResult, ServiceError> {
    let game = state.config().password_game();
    let player_id = submission.player_id;
    let password = submission.password;

    let (result, room) = state
        .run_room_transaction(room_id, |room, draft| {
            let now = SystemTime::now();
            if room.player(&player_id)?.has_submitted {
                return Ok(already_submitted());
            }
            let round = ActiveRound::of(room, Some(GameType::Password))?;
            ensure_before_deadline(room, now)?;

            let unmet = unmet_requirements(&password);
            if !unmet.is_empty() {
                let rejected = match draft.progress(&player_id, round.number) {
                    Some(PlayerProgress {
                        game: GameProgress::Password { rejected },
                        ..
                    }) => rejected + 1,
                    _ => 1,
                };
                draft.set_progress(
                    &player_id,
                    PlayerProgress {
                        round: round.number,
                        game: GameProgress::Password { rejected },
                    },
                );
                return Ok(PasswordResult {
                    accepted: false,
                    unmet_requirements: unmet,
                    score: None,
                    submission: SubmissionStatus::Pending,
                });
            }

            let Some(card) = game.score(&password, round.time_left(game, now)) else {
                return Err(ServiceError::InvalidState("password was rejected".into()));
            };
            let outcome = room.submit(&player_id, card, now)?;
            let score = room.player(&player_id)?.score.as_ref().map(Into::into);
            Ok(PasswordResult {
                accepted: true,
                unmet_requirements: Vec::new(),
                score,
                submission: outcome.into(),
            })
        })
        .await?;

    match result.submission {
        SubmissionStatus::Recorded { round_ended, .. } => {
            debug!(room_id = %room_id, player_id = %player_id, "password accepted");
            room_service::round_committed(state, &room, round_ended).await;
        }
        SubmissionStatus::Pending => {
            debug!(
                room_id = %room_id,
                player_id = %player_id,
                unmet = ?result.unmet_requirements,
                "password rejected"
            );
        }
        SubmissionStatus::AlreadySubmitted => {}
    }
    Ok(result)
}

pub(super) fn challenge(
    game: &PasswordGame,
    round: &ActiveRound,
    progress: Option<PlayerProgress>,
    submitted: bool,
    now: SystemTime,
) -> ChallengeView {
    let rejected_attempts = match progress {
        Some(PlayerProgress {
            game: GameProgress::Password { rejected },
            ..
        }) => rejected,
        _ => 0,
    };
    ChallengeView::Password {
        requirements: game.content().iter().map(RequirementView::from).collect(),
        rejected_attempts,
        time_left: round.time_left(game, now),
        submitted,
    }
}

fn already_submitted() -> PasswordResult {
    PasswordResult {
        accepted: false,
        unmet_requirements: Vec::new(),
        score: None,
        submission: SubmissionStatus::AlreadySubmitted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        services::minigame::current_challenge,
        services::test_support::playing_room,
        state::round::RoundStatus,
    };

    const STRONG: &str = "Rubik@Monday1+2=3";

    fn attempt(player_id: &str, password: &str) -> PasswordSubmission {
        PasswordSubmission {
            player_id: player_id.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn weak_password_lists_unmet_requirements() {
        let (state, room_id, creator, _) =
            playing_room(AppConfig::default(), GameType::Password).await;
        let result = submit_password(&state, room_id, attempt(&creator, "short"))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert!(result.unmet_requirements.contains(&1));
        assert_eq!(result.submission, SubmissionStatus::Pending);

        match current_challenge(&state, room_id, &creator).await.unwrap() {
            ChallengeView::Password {
                rejected_attempts,
                requirements,
                ..
            } => {
                assert_eq!(rejected_attempts, 1);
                assert_eq!(requirements.len(), 10);
            }
            other => panic!("unexpected challenge {other:?}"),
        }
        let room = state.load_room(room_id).await.unwrap();
        assert!(!room.player(&creator).unwrap().has_submitted);
    }

    #[tokio::test]
    async fn both_players_submitting_ends_the_round() {
        let (state, room_id, creator, guest) =
            playing_room(AppConfig::default(), GameType::Password).await;

        let first = submit_password(&state, room_id, attempt(&creator, STRONG))
            .await
            .unwrap();
        assert_eq!(
            first.submission,
            SubmissionStatus::Recorded {
                place: 1,
                round_ended: false
            }
        );
        let score = first.score.unwrap();
        assert_eq!(score.complexity, 80);
        assert_eq!(score.total, score.time_left + 80);

        let again = submit_password(&state, room_id, attempt(&creator, STRONG))
            .await
            .unwrap();
        assert_eq!(again.submission, SubmissionStatus::AlreadySubmitted);

        let second = submit_password(&state, room_id, attempt(&guest, STRONG))
            .await
            .unwrap();
        assert_eq!(
            second.submission,
            SubmissionStatus::Recorded {
                place: 2,
                round_ended: true
            }
        );

        let room = state.load_room(room_id).await.unwrap();
        assert_eq!(room.game_state.status, RoundStatus::RoundEnd);
        assert!(room.all_submitted);
        assert_eq!(room.game_state.round_history.len(), 1);
        assert_eq!(room.game_state.round_history[0].winners, vec![creator]);
    }

    #[tokio::test]
    async fn wrong_game_is_rejected() {
        let (state, room_id, creator, _) =
            playing_room(AppConfig::default(), GameType::Network).await;
        let err = submit_password(&state, room_id, attempt(&creator, STRONG))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
