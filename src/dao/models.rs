use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::{scoring::GameType, state::round::RoundStatus};

/// Score a player obtained in one round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameScoreEntity {
    /// Seconds remaining at submission.
    pub time_left: u32,
    /// Game specific performance score.
    pub complexity: u32,
    /// Ranking key.
    pub total: u32,
    /// 1-based submission rank.
    pub place: u32,
    /// When the score was recorded.
    pub completed_at: SystemTime,
}

/// Cumulative cross-round record of a player.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStatsEntity {
    /// Rounds completed.
    pub total_games: u32,
    /// Rounds finished in first place.
    pub wins: u32,
    /// Sum of round totals.
    pub total_score: u64,
    /// Highest time left ever submitted with.
    pub best_time: u32,
    /// Sum of places, the average is derived from it.
    pub place_sum: u64,
}

/// Member of a room as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Opaque player identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// When the player joined.
    pub joined_at: SystemTime,
    /// Score of the current round, if submitted.
    pub score: Option<GameScoreEntity>,
    /// Whether the player submitted during the current round.
    pub has_submitted: bool,
    /// Cumulative statistics.
    pub stats: PlayerStatsEntity,
}

/// Summary of a finished round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundSummaryEntity {
    /// Mini-game played.
    pub game_type: GameType,
    /// Round counter value while the round was played.
    pub round: u32,
    /// Players who submitted first.
    pub winners: Vec<String>,
    /// Scores keyed by player id.
    pub scores: IndexMap<String, GameScoreEntity>,
    /// When the round ended.
    pub ended_at: SystemTime,
}

/// Round state of a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameStateEntity {
    /// Mini-game of the current or last round.
    pub game_type: Option<GameType>,
    /// Round counter.
    pub round: u32,
    /// Lifecycle status.
    pub status: RoundStatus,
    /// When the current round started.
    pub start_time: Option<SystemTime>,
    /// When the current round expires.
    pub deadline: Option<SystemTime>,
    /// Append-only history of finished rounds.
    pub round_history: Vec<RoundSummaryEntity>,
}

/// Aggregate room entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Plaintext join secret.
    pub password: String,
    /// Player allowed to start rounds.
    pub creator_id: Option<String>,
    /// Players in join order.
    pub players: Vec<PlayerEntity>,
    /// Round state.
    pub game_state: GameStateEntity,
    /// Whether every player submitted.
    pub all_submitted: bool,
    /// Compare-and-swap counter.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the room was updated.
    pub updated_at: SystemTime,
}

/// Lobby listing entry (subset of RoomEntity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomListItemEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Number of players currently in the room.
    pub player_count: usize,
    /// Lifecycle status.
    pub status: RoundStatus,
    /// Round counter.
    pub round: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the room was updated.
    pub updated_at: SystemTime,
}

impl From<&RoomEntity> for RoomListItemEntity {
    fn from(entity: &RoomEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            player_count: entity.players.len(),
            status: entity.game_state.status,
            round: entity.game_state.round,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
