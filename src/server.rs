use std::{future::Future, io, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;

use crate::{
    Res,
    api::{self, AppState},
    config::Config,
    info,
    management::{AUTH_STATE_SWEEP_INTERVAL, AUTH_STATE_TTL, AuthStateStore, AuthStateSweeper},
    utils::SystemClock,
    warning,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health))
        .route("/config", get(api::config))
        .route("/login", get(api::login))
        .route("/callback", get(api::callback))
        .with_state(state)
}

/// App state with a fresh auth state store on the system clock, plus the
/// not yet started sweeper for that store.
pub fn default_state(config: Arc<Config>) -> (AppState, AuthStateSweeper) {
    let store = Arc::new(AuthStateStore::new(AUTH_STATE_TTL, Arc::new(SystemClock)));
    let sweeper = AuthStateSweeper::new(Arc::clone(&store), AUTH_STATE_SWEEP_INTERVAL);
    (AppState::new(config, store), sweeper)
}

/// Serves until `shutdown` resolves. The sweeper runs for exactly as long as
/// the server does.
pub async fn start_api_server<F>(
    state: AppState,
    mut sweeper: AuthStateSweeper,
    shutdown: F,
) -> Res<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("MySpotBackup is running on {}", state.config.uri);

    sweeper.start();
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await;
    sweeper.stop();

    result?;
    Ok(())
}

/// Resolves once `signal` fires. A signal that cannot be listened for never
/// resolves, so the server keeps running instead of stopping right away.
///
/// # Example
///
/// ```ignore
/// server::start_api_server(state, sweeper, server::shutdown_on(tokio::signal::ctrl_c())).await
/// ```
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warning!("Cannot listen for the shutdown signal: {}", e);
            std::future::pending::<()>().await
        }
    }
}
