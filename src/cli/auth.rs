use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, oneshot};

use crate::{
    api::TokenSink,
    config::Config,
    error,
    management::{AUTH_STATE_TTL, TokenManager},
    server, success,
    types::Token,
    warning,
};

/// Runs the login server in the background, opens the browser on `/login`
/// and caches the token the callback delivers.
pub async fn auth(config: Config) {
    let sink: TokenSink = Arc::new(Mutex::new(None));
    let login_url = config.login_url.clone();

    let (state, sweeper) = server::default_state(Arc::new(config));
    let state = state.with_token_sink(Arc::clone(&sink));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        server::start_api_server(state, sweeper, async move {
            let _ = stop_rx.await;
        })
        .await
    });

    if webbrowser::open(&login_url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            login_url
        )
    }

    let token = wait_for_token(&sink, &server, AUTH_STATE_TTL).await;

    let _ = stop_tx.send(());
    match server.await {
        Ok(Err(e)) => warning!("Login server stopped with an error: {}", e),
        Err(e) => warning!("Login server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    match token {
        Some(t) => {
            let token_manager = TokenManager::new(t);
            if let Err(e) = token_manager.persist().await {
                error!("Failed to save token to cache: {}", e);
            }
            success!("Authentication successful!");
        }
        None => error!("Authentication failed or timed out."),
    }
}

async fn wait_for_token<T>(
    sink: &TokenSink,
    server: &tokio::task::JoinHandle<T>,
    max_wait: Duration,
) -> Option<Token> {
    let start = Instant::now();

    while start.elapsed() < max_wait && !server.is_finished() {
        if let Some(token) = sink.lock().await.take() {
            return Some(token);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    None
}
