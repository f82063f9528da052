use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::room::{
        CreateRoomRequest, ExpireRoundResponse, JoinRoomRequest, JoinRoomResponse,
        ResetRoundRequest, RoomListItem, RoomView, SessionResponse, StartRoundRequest,
    },
    error::{AppError, ErrorBody},
    services::room_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Room lifecycle endpoints. Deletion sits behind the admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    let admin = Router::new()
        .route("/rooms/{id}", delete(delete_room))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/players/{player_id}", get(resume_session))
        .route("/rooms/{id}/round/start", post(start_round))
        .route("/rooms/{id}/round/reset", post(reset_round))
        .route("/rooms/{id}/round/expire", post(expire_round))
        .merge(admin)
}

/// List every room for the lobby.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "Rooms, newest first", body = [RoomListItem]),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn list_rooms(
    State(state): State<SharedState>,
) -> Result<Json<Vec<RoomListItem>>, AppError> {
    Ok(Json(room_service::list_rooms(&state).await?))
}

/// Open a new, empty room.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomView),
        (status = 400, description = "Invalid name or password")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomView>), AppError> {
    let room = room_service::create_room(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// Committed snapshot of a room. The password is never exposed.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room", body = RoomView),
        (status = 404, description = "Room not found", body = ErrorBody)
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::get_room(&state, id).await?))
}

/// Remove a room and its history.
#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "rooms",
    params(
        ("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
        ("id" = Uuid, Path, description = "Room identifier")
    ),
    responses(
        (status = 204, description = "Room deleted"),
        (status = 401, description = "Missing or wrong admin token", body = ErrorBody),
        (status = 404, description = "Room not found", body = ErrorBody)
    )
)]
pub async fn delete_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    room_service::delete_room(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join a room; the first player becomes its creator.
#[utoipa::path(
    post,
    path = "/rooms/{id}/join",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined", body = JoinRoomResponse),
        (status = 401, description = "Incorrect password", body = ErrorBody),
        (status = 404, description = "Room not found", body = ErrorBody),
        (status = 409, description = "Room is full", body = ErrorBody)
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    Ok(Json(room_service::join_room(&state, id, payload).await?))
}

/// Check a stored player id, e.g. after a page reload.
#[utoipa::path(
    get,
    path = "/rooms/{id}/players/{player_id}",
    tag = "rooms",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("player_id" = String, Path, description = "Player identifier returned by join")
    ),
    responses(
        (status = 200, description = "Session is still valid", body = SessionResponse),
        (status = 404, description = "Room or player gone", body = ErrorBody)
    )
)]
pub async fn resume_session(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, String)>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(
        room_service::resume_session(&state, id, &player_id).await?,
    ))
}

/// Start a round. Creator only, with at least two players.
#[utoipa::path(
    post,
    path = "/rooms/{id}/round/start",
    tag = "rounds",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = StartRoundRequest,
    responses(
        (status = 200, description = "Round started", body = RoomView),
        (status = 403, description = "Not the creator", body = ErrorBody),
        (status = 409, description = "Not enough players or not waiting", body = ErrorBody)
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<StartRoundRequest>>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::start_round(&state, id, payload).await?))
}

/// Return the room to the lobby. Creator only; a waiting room is left alone.
#[utoipa::path(
    post,
    path = "/rooms/{id}/round/reset",
    tag = "rounds",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = ResetRoundRequest,
    responses(
        (status = 200, description = "Room waiting", body = RoomView),
        (status = 403, description = "Not the creator", body = ErrorBody)
    )
)]
pub async fn reset_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ResetRoundRequest>>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::reset_round(&state, id, payload).await?))
}

/// Assert the round deadline has passed, submitting everyone still playing.
#[utoipa::path(
    post,
    path = "/rooms/{id}/round/expire",
    tag = "rounds",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Round ended, or already over", body = ExpireRoundResponse),
        (status = 409, description = "Deadline not reached", body = ErrorBody)
    )
)]
pub async fn expire_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExpireRoundResponse>, AppError> {
    Ok(Json(room_service::expire_round(&state, id).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config().admin_token() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            code: "missing_admin_token",
            message: "missing admin token header `X-Admin-Token`".into(),
        })?;

    if provided == expected {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized {
            code: "invalid_admin_token",
            message: "invalid admin token".into(),
        })
    }
}
