use std::time::SystemTime;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::play::{ChallengeView, DecryptionAttempt, EncryptionResult, SubmissionStatus},
    error::ServiceError,
    scoring::{
        GameType,
        encryption::{Challenge, EncryptionGame, EncryptionRun},
    },
    services::{
        minigame::{ActiveRound, ensure_before_deadline},
        room_service,
    },
    state::{GameProgress, PlayerProgress, SharedState},
};

/// Try a decryption of the round's challenge; a correct one is submitted.
pub async fn submit_decryption(
    state: &SharedState,
    room_id: Uuid,
    attempt: DecryptionAttempt,
) -> Result<EncryptionResult, ServiceError> {
    let game = state.config().encryption_game();
    let player_id = attempt.player_id;
    let answer = attempt.answer;

    let (result, room) = state
        .run_room_transaction(room_id, |room, draft| {
            let now = SystemTime::now();
            if room.player(&player_id)?.has_submitted {
                return Ok(already_submitted());
            }
            let round = ActiveRound::of(room, Some(GameType::Encryption))?;
            ensure_before_deadline(room, now)?;
            let challenge = round_challenge(game, &round)?;

            let mut run = current_run(draft.progress(&player_id, round.number));
            let evaluation = run.attempt(challenge, &answer, round.time_left(game, now));
            let submission: SubmissionStatus = match run.solved {
                Some(card) if evaluation.passed => room.submit(&player_id, card, now)?.into(),
                _ => SubmissionStatus::Pending,
            };
            draft.set_progress(
                &player_id,
                PlayerProgress {
                    round: round.number,
                    game: GameProgress::Encryption(run.clone()),
                },
            );

            Ok(EncryptionResult {
                correct: evaluation.passed,
                points: evaluation.points,
                attempts: run.attempts,
                streak: run.streak,
                submission,
            })
        })
        .await?;

    debug!(
        room_id = %room_id,
        player_id = %player_id,
        correct = result.correct,
        attempts = result.attempts,
        "decryption attempt recorded"
    );
    if let SubmissionStatus::Recorded { round_ended, .. } = result.submission {
        room_service::round_committed(state, &room, round_ended).await;
    }
    Ok(result)
}

pub(super) fn challenge(
    game: &EncryptionGame,
    round: &ActiveRound,
    progress: Option<PlayerProgress>,
    submitted: bool,
    now: SystemTime,
) -> Result<ChallengeView, ServiceError> {
    let challenge = round_challenge(game, round)?;
    let run = current_run(progress);
    Ok(ChallengeView::Encryption {
        encrypted_message: challenge.encrypted_message.clone(),
        key: challenge.key.clone(),
        hint: challenge.hint.clone(),
        kind: challenge.kind,
        points: challenge.points,
        attempts: run.attempts,
        time_left: round.time_left(game, now),
        submitted,
    })
}

fn round_challenge<'a>(
    game: &'a EncryptionGame,
    round: &ActiveRound,
) -> Result<&'a Challenge, ServiceError> {
    game.challenge_for_round(round.number)
        .ok_or_else(|| ServiceError::InvalidState("no encryption challenge is configured".into()))
}

fn current_run(progress: Option<PlayerProgress>) -> EncryptionRun {
    match progress {
        Some(PlayerProgress {
            game: GameProgress::Encryption(run),
            ..
        }) => run,
        _ => EncryptionRun::default(),
    }
}

fn already_submitted() -> EncryptionResult {
    EncryptionResult {
        correct: false,
        points: 0,
        attempts: 0,
        streak: 0,
        submission: SubmissionStatus::AlreadySubmitted,
    }
}
