use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for CyberGuard.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::delete_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::resume_session,
        crate::routes::rooms::start_round,
        crate::routes::rooms::reset_round,
        crate::routes::rooms::expire_round,
        crate::routes::leaderboard::room_leaderboard,
        crate::routes::play::current_challenge,
        crate::routes::play::submit_password,
        crate::routes::play::answer_question,
        crate::routes::play::submit_decryption,
        crate::routes::sse::lobby_stream,
        crate::routes::sse::room_stream,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomListItem,
            crate::dto::room::RoomView,
            crate::dto::room::JoinRoomResponse,
            crate::dto::room::SessionResponse,
            crate::dto::room::ExpireRoundResponse,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::play::ChallengeView,
            crate::dto::play::SubmissionStatus,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::RoomDeletedEvent,
            crate::scoring::GameType,
            crate::services::leaderboard::LeaderboardMode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room lobby, membership and leaderboard"),
        (name = "rounds", description = "Round lifecycle driven by the room creator"),
        (name = "play", description = "Mini-game challenges and answers"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_room_and_play_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/rooms",
            "/rooms/{id}/join",
            "/rooms/{id}/round/expire",
            "/rooms/{id}/play/encryption",
            "/rooms/{id}/events",
            "/sse/lobby",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
