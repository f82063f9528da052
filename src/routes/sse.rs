use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/lobby",
    tag = "sse",
    responses((status = 200, description = "Lobby SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream room list changes and degraded mode flips to the lobby.
pub async fn lobby_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_service::lobby_stream(&state)
}

#[utoipa::path(
    get,
    path = "/rooms/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room SSE stream, starting with a snapshot", content_type = "text/event-stream", body = String),
        (status = 404, description = "Room not found", body = crate::error::ErrorBody)
    )
)]
/// Stream every committed change of one room.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    Ok(sse_service::room_stream(state, id).await?)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/lobby", get(lobby_stream))
        .route("/rooms/{id}/events", get(room_stream))
}
