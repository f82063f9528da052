use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Rooms with live in-memory state (timers, progress).
    pub active_rooms: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(active_rooms: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_rooms,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(active_rooms: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_rooms,
        }
    }
}
