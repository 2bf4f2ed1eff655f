//! # API Module
//!
//! HTTP handlers of the login server.
//!
//! ## Endpoints
//!
//! - [`login`] - `GET /login`: starts a PKCE login and redirects to Spotify.
//! - [`callback`] - `GET /callback`: validates the state token, exchanges the
//!   code for a token and hands the token back to the opener window.
//! - [`config`] - `GET /config`: the public configuration as JSON.
//! - [`health`] - `GET /health`: status and version.
//! - [`index`] - `GET /`: landing page.
//!
//! All handlers share an [`AppState`]. Nothing in here spawns tasks or reads
//! the environment; the state carries every collaborator, which keeps the
//! handlers testable against fake token endpoints.

mod callback;
mod config;
mod health;
mod index;
mod login;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::Config,
    management::AuthStateStore,
    types::Token,
    utils::{RandomSource, SystemRandom},
};

pub use callback::{callback, token_delivery_page};
pub use config::config;
pub use health::health;
pub use index::index;
pub use login::login;

/// Receives the token of a successful login when the server runs for the
/// `auth` command.
pub type TokenSink = Arc<Mutex<Option<Token>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth_states: Arc<AuthStateStore>,
    pub random: Arc<dyn RandomSource>,
    pub http: reqwest::Client,
    pub token_sink: Option<TokenSink>,
}

impl AppState {
    pub fn new(config: Arc<Config>, auth_states: Arc<AuthStateStore>) -> Self {
        Self {
            config,
            auth_states,
            random: Arc::new(SystemRandom),
            http: reqwest::Client::new(),
            token_sink: None,
        }
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_token_sink(mut self, sink: TokenSink) -> Self {
        self.token_sink = Some(sink);
        self
    }
}
