use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{room::GameScoreView, validation::validate_not_blank},
    scoring::{
        encryption::CipherKind,
        network::Question,
        password::Requirement,
    },
    state::room::SubmitOutcome,
};

/// Identifies the player asking for their challenge.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ChallengeQuery {
    /// Player id returned by the join endpoint.
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
}

/// A password attempt.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PasswordSubmission {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
    #[validate(length(max = 256))]
    pub password: String,
}

/// An answer to the current network question. A missing choice is a timeout.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct NetworkAnswer {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
    #[serde(default)]
    pub choice: Option<usize>,
}

/// A decryption attempt.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DecryptionAttempt {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
    #[validate(length(max = 256))]
    pub answer: String,
}

/// What happened to the player's round result after a play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// The game goes on; nothing was submitted yet.
    Pending,
    /// The result was submitted to the room.
    Recorded {
        /// 1-based submission rank.
        place: u32,
        /// Whether this submission ended the round.
        round_ended: bool,
    },
    /// The player had already submitted this round.
    AlreadySubmitted,
}

impl From<SubmitOutcome> for SubmissionStatus {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Recorded { place, round_ended } => {
                SubmissionStatus::Recorded { place, round_ended }
            }
            SubmitOutcome::AlreadySubmitted => SubmissionStatus::AlreadySubmitted,
        }
    }
}

/// Result of a password attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct PasswordResult {
    pub accepted: bool,
    /// Ids of the requirements the attempt fails.
    pub unmet_requirements: Vec<u8>,
    pub score: Option<GameScoreView>,
    pub submission: SubmissionStatus,
}

/// Result of a network answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct NetworkResult {
    pub correct: bool,
    pub points: u32,
    pub streak: u32,
    /// Points accumulated this round.
    pub score: u32,
    /// Next question, absent once the set is finished.
    pub next_question: Option<QuestionView>,
    pub submission: SubmissionStatus,
}

/// Result of a decryption attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct EncryptionResult {
    pub correct: bool,
    pub points: u32,
    /// Wrong answers so far.
    pub attempts: u32,
    pub streak: u32,
    pub submission: SubmissionStatus,
}

/// Requirement of the password game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequirementView {
    pub id: u8,
    pub description: String,
}

impl From<&Requirement> for RequirementView {
    fn from(requirement: &Requirement) -> Self {
        Self {
            id: requirement.id,
            description: requirement.description.to_owned(),
        }
    }
}

/// Network question without its answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: u32,
    /// 0-based position in the set.
    pub index: usize,
    /// Size of the set.
    pub total: usize,
    pub text: String,
    pub answers: Vec<String>,
    pub category: Option<String>,
    pub points: u32,
    pub time_limit_secs: u32,
}

impl QuestionView {
    /// Hide the correct index of `question`.
    pub fn new(question: &Question, index: usize, total: usize) -> Self {
        Self {
            id: question.id,
            index,
            total,
            text: question.text.clone(),
            answers: question.answers.clone(),
            category: question.category.clone(),
            points: question.points,
            time_limit_secs: question.time_limit_secs,
        }
    }
}

/// What a player currently sees, per mini-game.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "game_type", rename_all = "snake_case")]
pub enum ChallengeView {
    /// Build a password meeting every requirement.
    Password {
        requirements: Vec<RequirementView>,
        rejected_attempts: u32,
        /// Seconds left in the round.
        time_left: u32,
        submitted: bool,
    },
    /// Answer the current question.
    Network {
        question: Option<QuestionView>,
        /// Seconds left on the current question.
        time_left: u32,
        streak: u32,
        score: u32,
        submitted: bool,
    },
    /// Decrypt the ciphertext.
    Encryption {
        encrypted_message: String,
        key: String,
        hint: String,
        kind: CipherKind,
        points: u32,
        attempts: u32,
        /// Seconds left in the round.
        time_left: u32,
        submitted: bool,
    },
}
