use std::time::SystemTime;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::play::{ChallengeView, NetworkAnswer, NetworkResult, QuestionView, SubmissionStatus},
    error::ServiceError,
    scoring::{
        GameType, MiniGame,
        network::{NetworkGame, NetworkRun},
        seconds_left,
    },
    services::{
        minigame::{ActiveRound, ensure_before_deadline},
        room_service,
    },
    state::{GameProgress, PlayerProgress, SharedState},
};

/// Answer the player's current question; the run is submitted after the last one.
///
/// The question clock is the server's: an answer arriving after the
/// question's limit counts as a timeout whatever the choice.
pub async fn answer_question(
    state: &SharedState,
    room_id: Uuid,
    answer: NetworkAnswer,
) -> Result<NetworkResult, ServiceError> {
    let game = state.config().network_game();
    let player_id = answer.player_id;
    let total = game.content().len();

    let (result, room) = state
        .run_room_transaction(room_id, |room, draft| {
            let now = SystemTime::now();
            if room.player(&player_id)?.has_submitted {
                return Ok(already_submitted());
            }
            let round = ActiveRound::of(room, Some(GameType::Network))?;
            ensure_before_deadline(room, now)?;

            let (mut run, started_at) =
                current_run(draft.progress(&player_id, round.number), &round);
            let Some(question) = game.question(run.index) else {
                return Err(ServiceError::InvalidState(
                    "every question has already been answered".into(),
                ));
            };

            let elapsed = now.duration_since(started_at).unwrap_or_default();
            let limit = question.time_limit();
            let choice = if elapsed <= limit { answer.choice } else { None };
            let evaluation = run.answer(question, choice, seconds_left(limit, elapsed));

            let submission: SubmissionStatus = if run.is_finished(total) {
                room.submit(&player_id, run.score_card(), now)?.into()
            } else {
                SubmissionStatus::Pending
            };
            draft.set_progress(
                &player_id,
                PlayerProgress {
                    round: round.number,
                    game: GameProgress::Network {
                        run: run.clone(),
                        question_started_at: now,
                    },
                },
            );

            Ok(NetworkResult {
                correct: evaluation.passed,
                points: evaluation.points,
                streak: run.streak,
                score: run.score,
                next_question: game
                    .question(run.index)
                    .map(|next| QuestionView::new(next, run.index, total)),
                submission,
            })
        })
        .await?;

    debug!(
        room_id = %room_id,
        player_id = %player_id,
        correct = result.correct,
        points = result.points,
        "network answer recorded"
    );
    if let SubmissionStatus::Recorded { round_ended, .. } = result.submission {
        room_service::round_committed(state, &room, round_ended).await;
    }
    Ok(result)
}

pub(super) fn challenge(
    game: &NetworkGame,
    round: &ActiveRound,
    progress: Option<PlayerProgress>,
    submitted: bool,
    now: SystemTime,
) -> ChallengeView {
    let total = game.content().len();
    let (run, started_at) = current_run(progress, round);
    let question = game.question(run.index);
    let time_left = question
        .map(|question| {
            let elapsed = now.duration_since(started_at).unwrap_or_default();
            seconds_left(question.time_limit(), elapsed)
        })
        .unwrap_or(0);

    ChallengeView::Network {
        question: question.map(|question| QuestionView::new(question, run.index, total)),
        time_left,
        streak: run.streak,
        score: run.score,
        submitted,
    }
}

/// The player's run and when their current question was shown.
///
/// The first question is shown when the round starts.
fn current_run(progress: Option<PlayerProgress>, round: &ActiveRound) -> (NetworkRun, SystemTime) {
    match progress {
        Some(PlayerProgress {
            game:
                GameProgress::Network {
                    run,
                    question_started_at,
                },
            ..
        }) => (run, question_started_at),
        _ => (NetworkRun::default(), round.start_time),
    }
}

fn already_submitted() -> NetworkResult {
    NetworkResult {
        correct: false,
        points: 0,
        streak: 0,
        score: 0,
        next_question: None,
        submission: SubmissionStatus::AlreadySubmitted,
    }
}
