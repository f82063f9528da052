//! Pure scoring rules for the three mini-games.
//!
//! Nothing in here touches a room: the engines map raw performance (answers,
//! remaining time, streak and attempt counters) to points and a pass/fail flag.
//! The room authority is the only writer of scores.

/// Caesar-style cipher challenges.
pub mod encryption;
/// Sequential multiple choice quiz.
pub mod network;
/// Password requirements and complexity bonuses.
pub mod password;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The mini-game a round is played with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Build a password satisfying every requirement, score bonuses for extra strength.
    Password,
    /// Answer a sequence of network-defense questions against a per-question clock.
    Network,
    /// Decrypt a ciphertext.
    Encryption,
}

impl GameType {
    /// Every playable mini-game, in menu order.
    pub const ALL: [GameType; 3] = [GameType::Password, GameType::Network, GameType::Encryption];
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameType::Password => "password",
            GameType::Network => "network",
            GameType::Encryption => "encryption",
        };
        f.write_str(label)
    }
}

/// Raw result of a finished mini-game, before the room assigns a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreCard {
    /// Seconds left on the relevant clock when the player finished.
    pub time_left: u32,
    /// Game specific performance score.
    pub complexity: u32,
    /// Ranking key.
    pub total: u32,
}

impl ScoreCard {
    /// Score card used when a player runs out of time without a valid submission.
    pub const fn zero() -> Self {
        Self {
            time_left: 0,
            complexity: 0,
            total: 0,
        }
    }
}

/// Outcome of evaluating one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Whether the answer was accepted.
    pub passed: bool,
    /// Points awarded for this answer.
    pub points: u32,
}

impl Evaluation {
    pub(crate) const fn rejected() -> Self {
        Self {
            passed: false,
            points: 0,
        }
    }

    pub(crate) const fn accepted(points: u32) -> Self {
        Self {
            passed: true,
            points,
        }
    }
}

/// Contract shared by every mini-game rule set.
pub trait MiniGame {
    /// Content shown to players (requirements, questions or challenges).
    type Content: ?Sized;

    /// Which mini-game this is.
    fn game_type(&self) -> GameType;

    /// How long a round of this game lasts.
    fn round_duration(&self) -> Duration;

    /// Read-only access to the game content.
    fn content(&self) -> &Self::Content;
}

/// Seconds left on a clock of `limit` once `elapsed` has passed, floored like a countdown.
pub fn seconds_left(limit: Duration, elapsed: Duration) -> u32 {
    let left = limit.saturating_sub(elapsed).as_secs();
    u32::try_from(left).unwrap_or(u32::MAX)
}
