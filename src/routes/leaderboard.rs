use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse},
    error::{AppError, ErrorBody},
    services::leaderboard,
    state::SharedState,
};

/// Leaderboard projection of a room.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{id}/leaderboard", get(room_leaderboard))
}

/// Rank the room's players for the current round or overall.
#[utoipa::path(
    get,
    path = "/rooms/{id}/leaderboard",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier"), LeaderboardQuery),
    responses(
        (status = 200, description = "Ranked players", body = LeaderboardResponse),
        (status = 404, description = "Room not found", body = ErrorBody)
    )
)]
pub async fn room_leaderboard(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(
        leaderboard::room_leaderboard(&state, id, query.mode).await?,
    ))
}
