use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::RoomListItemEntity,
    dto::{
        format_system_time,
        validation::{validate_display_name, validate_not_blank},
    },
    scoring::GameType,
    state::{
        room::{GameScore, GameState, MAX_PLAYERS, Player, PlayerStats, Room, RoundSummary},
        round::RoundStatus,
    },
};

/// Payload used to open a new room from the lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
    /// Join secret shared with the other players.
    #[validate(custom(function = "validate_not_blank"), length(max = 64))]
    pub password: String,
}

/// Payload used to join a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    /// Display name of the joining player.
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
    pub password: String,
}

/// Returned once a player joined; the client keeps `player_id` for later requests.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRoomResponse {
    pub player_id: String,
    pub is_creator: bool,
    pub room: RoomView,
}

/// Returned when a client resumes a stored session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub player: PlayerView,
    pub is_creator: bool,
    pub room: RoomView,
}

/// Creator request to start a round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartRoundRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
    pub game_type: GameType,
}

/// Creator request to go back to the lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ResetRoundRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
}

/// Result of asserting that the round time is up.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExpireRoundResponse {
    /// Players whose partial result was submitted on their behalf, in join order.
    pub auto_submitted: Vec<String>,
    pub room: RoomView,
}

/// Lobby entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomListItem {
    pub id: Uuid,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub status: RoundStatus,
    pub round: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<RoomListItemEntity> for RoomListItem {
    fn from(entity: RoomListItemEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            player_count: entity.player_count,
            max_players: MAX_PLAYERS,
            status: entity.status,
            round: entity.round,
            created_at: format_system_time(entity.created_at),
            updated_at: format_system_time(entity.updated_at),
        }
    }
}

impl From<&Room> for RoomListItem {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            player_count: room.players.len(),
            max_players: MAX_PLAYERS,
            status: room.game_state.status,
            round: room.game_state.round,
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

/// Public projection of a room. The join password is never exposed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomView {
    pub id: Uuid,
    pub name: String,
    pub creator_id: Option<String>,
    /// Players in join order.
    pub players: Vec<PlayerView>,
    pub game_state: GameStateView,
    pub all_submitted: bool,
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            creator_id: room.creator_id.clone(),
            players: room.players.values().map(PlayerView::from).collect(),
            game_state: GameStateView::from(&room.game_state),
            all_submitted: room.all_submitted,
            version: room.version,
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

/// Round state as shown to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameStateView {
    pub game_type: Option<GameType>,
    pub round: u32,
    pub status: RoundStatus,
    pub start_time: Option<String>,
    /// Clients derive their countdown from this server timestamp.
    pub deadline: Option<String>,
    pub round_history: Vec<RoundSummaryView>,
}

impl From<&GameState> for GameStateView {
    fn from(state: &GameState) -> Self {
        Self {
            game_type: state.game_type,
            round: state.round,
            status: state.status,
            start_time: state.start_time.map(format_system_time),
            deadline: state.deadline.map(format_system_time),
            round_history: state.round_history.iter().map(Into::into).collect(),
        }
    }
}

/// Member of a room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub joined_at: String,
    pub score: Option<GameScoreView>,
    pub has_submitted: bool,
    pub stats: PlayerStatsView,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            joined_at: format_system_time(player.joined_at),
            score: player.score.as_ref().map(Into::into),
            has_submitted: player.has_submitted,
            stats: PlayerStatsView::from(&player.stats),
        }
    }
}

/// Score of one round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameScoreView {
    pub time_left: u32,
    pub complexity: u32,
    pub total: u32,
    pub place: u32,
    pub completed_at: String,
}

impl From<&GameScore> for GameScoreView {
    fn from(score: &GameScore) -> Self {
        Self {
            time_left: score.time_left,
            complexity: score.complexity,
            total: score.total,
            place: score.place,
            completed_at: format_system_time(score.completed_at),
        }
    }
}

/// Cumulative statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerStatsView {
    pub total_games: u32,
    pub wins: u32,
    pub total_score: u64,
    pub best_time: u32,
    pub average_place: f64,
}

impl From<&PlayerStats> for PlayerStatsView {
    fn from(stats: &PlayerStats) -> Self {
        Self {
            total_games: stats.total_games,
            wins: stats.wins,
            total_score: stats.total_score,
            best_time: stats.best_time,
            average_place: stats.average_place(),
        }
    }
}

/// Finished round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundSummaryView {
    pub game_type: GameType,
    pub round: u32,
    pub winners: Vec<String>,
    pub scores: Vec<RoundScoreView>,
    pub ended_at: String,
}

/// One player's line in a finished round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundScoreView {
    pub player_id: String,
    pub score: GameScoreView,
}

impl From<&RoundSummary> for RoundSummaryView {
    fn from(summary: &RoundSummary) -> Self {
        Self {
            game_type: summary.game_type,
            round: summary.round,
            winners: summary.winners.clone(),
            scores: summary
                .scores
                .iter()
                .map(|(player_id, score)| RoundScoreView {
                    player_id: player_id.clone(),
                    score: score.into(),
                })
                .collect(),
            ended_at: format_system_time(summary.ended_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn room_view_hides_the_password() {
        let mut room = Room::new("lab".into(), "hunter2".into(), SystemTime::now());
        room.join("p1".into(), "Ada".into(), "hunter2", SystemTime::now())
            .unwrap();
        let json = serde_json::to_string(&RoomView::from(&room)).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"creator_id\":\"p1\""));
    }

    #[test]
    fn create_request_rejects_blank_names() {
        let request = CreateRoomRequest {
            name: "  ".into(),
            password: "pw".into(),
        };
        assert!(request.validate().is_err());
        let request = CreateRoomRequest {
            name: "Blue team".into(),
            password: "pw".into(),
        };
        assert!(request.validate().is_ok());
    }
}
