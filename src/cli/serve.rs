use std::sync::Arc;

use crate::{config::Config, error, info, server};

pub async fn serve(config: Config) {
    info!(
        "Login at {} (callback {})",
        config.login_url, config.callback_uri
    );

    let (state, sweeper) = server::default_state(Arc::new(config));
    let shutdown = server::shutdown_on(tokio::signal::ctrl_c());
    if let Err(e) = server::start_api_server(state, sweeper, shutdown).await {
        error!("Server error: {}", e);
    }
}

