use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::play::{
        ChallengeQuery, ChallengeView, DecryptionAttempt, EncryptionResult, NetworkAnswer,
        NetworkResult, PasswordResult, PasswordSubmission,
    },
    error::{AppError, ErrorBody},
    services::minigame::{self, encryption, network, password},
    state::SharedState,
};

/// Mini-game endpoints used while a round is being played.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{id}/play/challenge", get(current_challenge))
        .route("/rooms/{id}/play/password", post(submit_password))
        .route("/rooms/{id}/play/network", post(answer_question))
        .route("/rooms/{id}/play/encryption", post(submit_decryption))
}

/// What the player currently has to solve, with the time left.
#[utoipa::path(
    get,
    path = "/rooms/{id}/play/challenge",
    tag = "play",
    params(("id" = Uuid, Path, description = "Room identifier"), ChallengeQuery),
    responses(
        (status = 200, description = "Current challenge", body = ChallengeView),
        (status = 404, description = "Room or player not found", body = ErrorBody),
        (status = 409, description = "No round is being played", body = ErrorBody)
    )
)]
pub async fn current_challenge(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Query(query)): Valid<Query<ChallengeQuery>>,
) -> Result<Json<ChallengeView>, AppError> {
    Ok(Json(
        minigame::current_challenge(&state, id, &query.player_id).await?,
    ))
}

/// Try a password; a weak one comes back with the unmet requirement ids.
#[utoipa::path(
    post,
    path = "/rooms/{id}/play/password",
    tag = "play",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = PasswordSubmission,
    responses(
        (status = 200, description = "Password evaluated", body = PasswordResult),
        (status = 409, description = "Not a running password round", body = ErrorBody)
    )
)]
pub async fn submit_password(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PasswordSubmission>>,
) -> Result<Json<PasswordResult>, AppError> {
    Ok(Json(password::submit_password(&state, id, payload).await?))
}

/// Answer the current network question. A missing choice counts as a timeout.
#[utoipa::path(
    post,
    path = "/rooms/{id}/play/network",
    tag = "play",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = NetworkAnswer,
    responses(
        (status = 200, description = "Answer evaluated", body = NetworkResult),
        (status = 409, description = "Not a running network round", body = ErrorBody)
    )
)]
pub async fn answer_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<NetworkAnswer>>,
) -> Result<Json<NetworkResult>, AppError> {
    Ok(Json(network::answer_question(&state, id, payload).await?))
}

/// Try a decryption of the round's ciphertext.
#[utoipa::path(
    post,
    path = "/rooms/{id}/play/encryption",
    tag = "play",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = DecryptionAttempt,
    responses(
        (status = 200, description = "Attempt evaluated", body = EncryptionResult),
        (status = 409, description = "Not a running encryption round", body = ErrorBody)
    )
)]
pub async fn submit_decryption(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<DecryptionAttempt>>,
) -> Result<Json<EncryptionResult>, AppError> {
    Ok(Json(
        encryption::submit_decryption(&state, id, payload).await?,
    ))
}
