use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{services::leaderboard::LeaderboardMode, state::room::Player};

/// Query of the leaderboard endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// `in_round` (default) or `overall`.
    #[serde(default)]
    #[param(value_type = Option<LeaderboardMode>)]
    pub mode: LeaderboardMode,
}

/// Ranked players.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub mode: LeaderboardMode,
    pub round: u32,
    pub entries: Vec<LeaderboardEntry>,
}

/// One line of the leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based position in the projection.
    pub rank: usize,
    pub player_id: String,
    pub name: String,
    /// Current round total, if submitted.
    pub round_total: Option<u32>,
    pub place: Option<u32>,
    pub has_submitted: bool,
    pub total_score: u64,
    pub wins: u32,
    pub total_games: u32,
    pub average_place: f64,
}

impl LeaderboardEntry {
    /// Entry for `player` ranked at `rank`.
    pub fn new(rank: usize, player: &Player) -> Self {
        Self {
            rank,
            player_id: player.id.clone(),
            name: player.name.clone(),
            round_total: player.score.map(|score| score.total),
            place: player.score.map(|score| score.place),
            has_submitted: player.has_submitted,
            total_score: player.stats.total_score,
            wins: player.stats.wins,
            total_games: player.stats.total_games,
            average_place: player.stats.average_place(),
        }
    }
}
