use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::room::RoomError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The join secret does not match.
    #[error("incorrect password")]
    IncorrectPassword,
    /// The room already holds the maximum number of players.
    #[error("room is full ({max} players)")]
    RoomFull {
        /// Capacity of the room.
        max: usize,
    },
    /// No room with this identifier exists.
    #[error("room {0} not found")]
    RoomNotFound(Uuid),
    /// The player is not a member of the room.
    #[error("player {0} is not in this room")]
    PlayerNotInRoom(String),
    /// A creator-only action was attempted by someone else.
    #[error("{0}")]
    NotAuthorized(String),
    /// Not enough players to start a round.
    #[error("at least {required} players are needed to start a round (have {actual})")]
    InsufficientPlayers {
        /// Minimum player count.
        required: usize,
        /// Current player count.
        actual: usize,
    },
    /// Storage backend failed the request.
    #[error("storage unavailable")]
    StoreUnavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The room changed underneath the transaction.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl ServiceError {
    /// Stable machine readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::IncorrectPassword => "incorrect_password",
            ServiceError::RoomFull { .. } => "room_full",
            ServiceError::RoomNotFound(_) => "room_not_found",
            ServiceError::PlayerNotInRoom(_) => "player_not_in_room",
            ServiceError::NotAuthorized(_) => "not_authorized",
            ServiceError::InsufficientPlayers { .. } => "insufficient_players",
            ServiceError::StoreUnavailable(_) => "store_unavailable",
            ServiceError::Degraded => "degraded",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Timeout => "timeout",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Missing { id } => ServiceError::RoomNotFound(id),
            conflict @ StorageError::Conflict { .. } => {
                ServiceError::Conflict(conflict.to_string())
            }
            unavailable => ServiceError::StoreUnavailable(unavailable),
        }
    }
}

impl From<RoomError> for ServiceError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::IncorrectPassword => ServiceError::IncorrectPassword,
            RoomError::RoomFull { max } => ServiceError::RoomFull { max },
            RoomError::PlayerNotInRoom(id) => ServiceError::PlayerNotInRoom(id),
            RoomError::InsufficientPlayers { required, actual } => {
                ServiceError::InsufficientPlayers { required, actual }
            }
            err @ RoomError::NotAuthorized { .. } => ServiceError::NotAuthorized(err.to_string()),
            err @ RoomError::DuplicatePlayer(_) => ServiceError::Conflict(err.to_string()),
            err @ (RoomError::InvalidTransition(_)
            | RoomError::RoundNotActive
            | RoomError::DeadlineNotReached) => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest {
            code: "invalid_input",
            message: format!("validation failed: {}", err),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{message}")]
    BadRequest {
        /// Machine readable code.
        code: &'static str,
        /// Human readable explanation.
        message: String,
    },
    /// Missing or wrong credentials.
    #[error("{message}")]
    Unauthorized {
        /// Machine readable code.
        code: &'static str,
        /// Human readable explanation.
        message: String,
    },
    /// Authenticated but not allowed.
    #[error("{message}")]
    Forbidden {
        /// Machine readable code.
        code: &'static str,
        /// Human readable explanation.
        message: String,
    },
    /// Requested resource not found.
    #[error("{message}")]
    NotFound {
        /// Machine readable code.
        code: &'static str,
        /// Human readable explanation.
        message: String,
    },
    /// Conflict with current state.
    #[error("{message}")]
    Conflict {
        /// Machine readable code.
        code: &'static str,
        /// Human readable explanation.
        message: String,
    },
    /// Service unavailable or degraded.
    #[error("{message}")]
    ServiceUnavailable {
        /// Machine readable code.
        code: &'static str,
        /// Human readable explanation.
        message: String,
    },
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::Unauthorized { code, .. } => (StatusCode::UNAUTHORIZED, *code),
            AppError::Forbidden { code, .. } => (StatusCode::FORBIDDEN, *code),
            AppError::NotFound { code, .. } => (StatusCode::NOT_FOUND, *code),
            AppError::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            AppError::ServiceUnavailable { code, .. } => (StatusCode::SERVICE_UNAVAILABLE, *code),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        let message = match &err {
            ServiceError::StoreUnavailable(source) => source.to_string(),
            other => other.to_string(),
        };
        match err {
            ServiceError::IncorrectPassword => AppError::Unauthorized { code, message },
            ServiceError::NotAuthorized(_) => AppError::Forbidden { code, message },
            ServiceError::RoomNotFound(_) | ServiceError::PlayerNotInRoom(_) => {
                AppError::NotFound { code, message }
            }
            ServiceError::RoomFull { .. }
            | ServiceError::InsufficientPlayers { .. }
            | ServiceError::InvalidState(_)
            | ServiceError::Conflict(_) => AppError::Conflict { code, message },
            ServiceError::InvalidInput(_) => AppError::BadRequest { code, message },
            ServiceError::StoreUnavailable(_) | ServiceError::Degraded | ServiceError::Timeout => {
                AppError::ServiceUnavailable { code, message }
            }
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine readable error code, e.g. `room_not_found`.
    pub code: String,
    /// Human readable explanation.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.parts();
        let payload = Json(ErrorBody {
            code: code.to_owned(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::round::{InvalidTransition, RoundEvent, RoundStatus};

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(status_of(ServiceError::IncorrectPassword), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ServiceError::RoomFull { max: 8 }), StatusCode::CONFLICT);
        assert_eq!(status_of(ServiceError::RoomNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ServiceError::PlayerNotInRoom("abc".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServiceError::NotAuthorized("nope".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ServiceError::InsufficientPlayers {
                required: 2,
                actual: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(ServiceError::Timeout), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn missing_room_in_storage_is_room_not_found() {
        let id = Uuid::new_v4();
        let err = ServiceError::from(StorageError::Missing { id });
        assert!(matches!(err, ServiceError::RoomNotFound(found) if found == id));
        assert_eq!(err.code(), "room_not_found");
    }

    #[test]
    fn version_conflict_is_surfaced() {
        let err = ServiceError::from(StorageError::Conflict {
            id: Uuid::nil(),
            expected: 3,
        });
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn transition_errors_become_invalid_state() {
        let err = ServiceError::from(RoomError::from(InvalidTransition {
            from: RoundStatus::Playing,
            event: RoundEvent::Reset,
        }));
        assert!(matches!(err, ServiceError::InvalidState(_)));
        let err = ServiceError::from(RoomError::NotAuthorized {
            action: "start a round",
        });
        assert_eq!(err.to_string(), "only the room creator can start a round");
    }
}
