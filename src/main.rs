//! CyberGuard backend binary wiring REST, SSE and the room store layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cyberguard_back::{
    config::AppConfig,
    dao::room_store::memory::MemoryRoomStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    install_room_store(&app_state).await?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the backend named by `STORAGE_BACKEND`.
///
/// The in-memory store is installed right away; database backends are
/// connected by the storage supervisor in the background, leaving the
/// service degraded until the first connection succeeds.
async fn install_room_store(state: &SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".into());
    match backend.as_str() {
        "memory" => {
            state.set_room_store(Arc::new(MemoryRoomStore::new())).await;
            info!("using in-memory room store");
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use cyberguard_back::dao::{
                room_store::{
                    RoomStore,
                    mongodb::{MongoConfig, MongoRoomStore},
                },
                storage::StorageError,
            };
            use cyberguard_back::services::storage_supervisor;

            tokio::spawn(storage_supervisor::run(state.clone(), || async {
                let config = MongoConfig::from_env().await.map_err(StorageError::from)?;
                let store = MongoRoomStore::connect(config)
                    .await
                    .map_err(StorageError::from)?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
            }));
            info!("connecting to MongoDB room store in the background");
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use cyberguard_back::dao::{
                room_store::{
                    RoomStore,
                    couchdb::{CouchConfig, CouchRoomStore},
                },
                storage::StorageError,
            };
            use cyberguard_back::services::storage_supervisor;

            tokio::spawn(storage_supervisor::run(state.clone(), || async {
                let config = CouchConfig::from_env().map_err(StorageError::from)?;
                let store = CouchRoomStore::connect(config)
                    .await
                    .map_err(StorageError::from)?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
            }));
            info!("connecting to CouchDB room store in the background");
        }
        other => {
            warn!(backend = other, "unknown STORAGE_BACKEND");
            anyhow::bail!("unsupported STORAGE_BACKEND `{other}` (expected memory, mongo or couch)");
        }
    }
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
