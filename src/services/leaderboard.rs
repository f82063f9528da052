use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::leaderboard::{LeaderboardEntry, LeaderboardResponse},
    error::ServiceError,
    state::{SharedState, room::Player},
};

/// Ranking a leaderboard is projected on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardMode {
    /// Current round totals; players without a score go last.
    #[default]
    InRound,
    /// Cumulative score across every round.
    Overall,
}

/// Order `players` for display. The sort is stable, so ties keep join order.
pub fn project<'a, I>(players: I, mode: LeaderboardMode) -> Vec<&'a Player>
where
    I: IntoIterator<Item = &'a Player>,
{
    let mut ranked: Vec<&Player> = players.into_iter().collect();
    match mode {
        LeaderboardMode::InRound => {
            ranked.sort_by_key(|player| Reverse(player.score.map(|score| score.total)))
        }
        LeaderboardMode::Overall => ranked.sort_by_key(|player| Reverse(player.stats.total_score)),
    }
    ranked
}

/// Leaderboard of a room's committed state.
pub async fn room_leaderboard(
    state: &SharedState,
    room_id: Uuid,
    mode: LeaderboardMode,
) -> Result<LeaderboardResponse, ServiceError> {
    let room = state.load_room(room_id).await?;
    let entries = project(room.players.values(), mode)
        .into_iter()
        .enumerate()
        .map(|(index, player)| LeaderboardEntry::new(index + 1, player))
        .collect();
    Ok(LeaderboardResponse {
        mode,
        round: room.game_state.round,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::room::{GameScore, PlayerStats};

    fn player(id: &str, total: Option<u32>, overall: u64) -> Player {
        Player {
            id: id.into(),
            name: id.to_uppercase(),
            joined_at: SystemTime::UNIX_EPOCH,
            score: total.map(|total| GameScore {
                time_left: 0,
                complexity: total,
                total,
                place: 1,
                completed_at: SystemTime::UNIX_EPOCH,
            }),
            has_submitted: total.is_some(),
            stats: PlayerStats {
                total_score: overall,
                ..PlayerStats::default()
            },
        }
    }

    fn ids(ranked: &[&Player]) -> Vec<String> {
        ranked.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn in_round_puts_unscored_players_last() {
        let players = [
            player("a", None, 0),
            player("b", Some(80), 0),
            player("c", Some(130), 0),
            player("d", None, 0),
        ];
        let ranked = project(&players, LeaderboardMode::InRound);
        assert_eq!(ids(&ranked), ["c", "b", "a", "d"]);
    }

    #[test]
    fn ties_keep_join_order() {
        let players = [
            player("a", Some(50), 10),
            player("b", Some(90), 10),
            player("c", Some(50), 10),
        ];
        assert_eq!(ids(&project(&players, LeaderboardMode::InRound)), ["b", "a", "c"]);
        assert_eq!(ids(&project(&players, LeaderboardMode::Overall)), ["a", "b", "c"]);
    }

    #[test]
    fn overall_uses_cumulative_score() {
        let players = [
            player("a", Some(300), 300),
            player("b", None, 900),
            player("c", Some(10), 450),
        ];
        assert_eq!(ids(&project(&players, LeaderboardMode::Overall)), ["b", "c", "a"]);
    }

    #[test]
    fn mode_parses_from_query_strings() {
        let mode: LeaderboardMode = serde_json::from_str("\"overall\"").unwrap();
        assert_eq!(mode, LeaderboardMode::Overall);
        assert_eq!(LeaderboardMode::default(), LeaderboardMode::InRound);
    }

    #[tokio::test]
    async fn room_leaderboard_ranks_submitted_players_first() {
        use crate::{
            config::AppConfig,
            dto::play::PasswordSubmission,
            scoring::GameType,
            services::{minigame::password::submit_password, test_support::playing_room},
        };

        let (state, room_id, creator, guest) =
            playing_room(AppConfig::default(), GameType::Password).await;
        submit_password(
            &state,
            room_id,
            PasswordSubmission {
                player_id: guest.clone(),
                password: "Rubik@Monday1+2=3".into(),
            },
        )
        .await
        .unwrap();

        let board = room_leaderboard(&state, room_id, LeaderboardMode::InRound)
            .await
            .unwrap();
        assert_eq!(board.round, 1);
        let order: Vec<_> = board.entries.iter().map(|e| e.player_id.clone()).collect();
        assert_eq!(order, [guest, creator]);
        assert_eq!(board.entries[0].rank, 1);
        assert_eq!(board.entries[0].place, Some(1));
        assert!(board.entries[1].round_total.is_none());
    }
}
