//! # CLI Module
//!
//! Implementations of the `myspotbackup` commands. Each command is an async
//! function that reports through the crate's console macros and exits the
//! process via [`error!`](crate::error) on unrecoverable failures; the
//! library modules underneath only return errors.
//!
//! ## Commands
//!
//! - [`serve`] - run the login server until Ctrl-C
//! - [`auth`] - log in through the browser and cache the token
//! - [`export`] - write the account's playlists and saved tracks to a file
//! - [`import`] - reconcile a backup file into the account
//!
//! ## Tokens
//!
//! `export` and `import` take `--token` or fall back to the token cached by
//! `auth`, refreshing it when it is about to expire.

mod auth;
mod export;
mod import;
mod serve;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table;

pub use auth::auth;
pub use export::export;
pub use import::import;
pub use serve::serve;

use crate::{
    config::Config,
    error,
    management::TokenManager,
    sync::{Progress, ProgressSink},
    types::{Collection, SummaryTableRow},
};

impl ProgressSink for ProgressBar {
    fn report(&self, progress: &Progress) {
        let mut message = progress.step.clone();
        if progress.playlists_total > 0 {
            message.push_str(&format!(
                " [{}/{} playlists]",
                progress.playlists_done, progress.playlists_total
            ));
        }
        if progress.tracks_total > 0 || progress.tracks_done > 0 {
            message.push_str(&format!(
                " [{}/{} tracks]",
                progress.tracks_done, progress.tracks_total
            ));
        }
        self.set_message(message);
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}

async fn access_token(config: &Config, token: Option<String>) -> String {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        return token;
    }

    let mut token_mgr = match TokenManager::load().await {
        Ok(t) => t,
        Err(e) => error!(
            "Failed to load token. Please run myspotbackup auth\n Error: {}",
            e
        ),
    };

    match token_mgr.get_valid_token(config).await {
        Ok(token) => token,
        Err(e) => error!(
            "Cached token is no longer valid. Please run myspotbackup auth\n Error: {}",
            e
        ),
    }
}

fn summary_table(rows: Vec<(&str, &Collection)>) -> Table {
    Table::new(rows.into_iter().map(|(source, collection)| SummaryTableRow {
        source: source.to_string(),
        playlists: collection.playlist_count(),
        tracks: collection.track_count(),
    }))
}
