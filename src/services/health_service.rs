use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report service status, probing the room store when one is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_room_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "room store health check failed");
            }
        }
        Err(_) => warn!("room store unavailable (degraded mode)"),
    }

    let active_rooms = state.active_rooms();
    if state.is_degraded() {
        HealthResponse::degraded(active_rooms)
    } else {
        HealthResponse::ok(active_rooms)
    }
}
