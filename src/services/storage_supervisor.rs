use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(30);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a room store installed, dropping to degraded mode while it is unreachable.
///
/// A failed health check triggers up to [`MAX_RECONNECT_ATTEMPTS`] in-place
/// reconnects; when they are exhausted the store is dropped and `connect`
/// is retried with exponential backoff.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_room_store(store.clone()).await;
                info!("room store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch(&state, store.as_ref()).await;

                state.clear_room_store().await;
                warn!("exhausted room store reconnect attempts; reconnecting from scratch");
            }
            Err(err) => {
                warn!(error = %err, "room store connection attempt failed");
            }
        }
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll `store` until it fails and cannot be revived in place.
async fn watch(state: &SharedState, store: &dyn RoomStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "room store health check failed");
                if !reconnect(state, store).await {
                    return;
                }
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn RoomStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "room store reconnected after a failed health check");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "room store reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "room store reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}
