//! MySpotBackup Library
//!
//! Backs up and restores a Spotify library: playlists and saved tracks. The
//! crate contains the PKCE login server, a rate-limit aware Spotify Web API
//! client, the snapshot builder, the reconciliation engine that turns an
//! imported backup into a minimal set of additive API calls, and the executor
//! that applies those calls.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for the login server (`/login`, `/callback`, ...)
//! - `cli` - Command-line command implementations
//! - `config` - Environment loading and the immutable `Config`
//! - `management` - Stateful managers: auth state, token cache, origins, backups
//! - `server` - Router construction and the server loop
//! - `spotify` - Spotify Web API client and token endpoint calls
//! - `sync` - Snapshot builder, reconciliation engine and mutation executor
//! - `types` - Data model and wire types
//! - `utils` - PKCE helpers, id validation and injected clock/random sources
//!
//! # Example
//!
//! ```
//! use myspotbackup::{config, sync};
//!
//! #[tokio::main]
//! async fn main() -> myspotbackup::Res<()> {
//!     config::load_env().await?;
//!     let config = config::Config::from_env()?;
//!     // Build a client and call sync::build_snapshot(...)
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod management;
pub mod server;
pub mod spotify;
pub mod sync;
pub mod types;
pub mod utils;

/// Result alias for fallible operations outside the typed error paths,
/// e.g. binding and running the server.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Console status line with a blue `o`.
///
/// ```
/// info!("Found {} playlists", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Console status line with a green check mark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a red `!` line and exits with status 1.
///
/// Only for the command layer: library code returns errors instead. The
/// expansion diverges, so it can stand in for a value in `match` arms.
///
/// ```
/// let config = match Config::from_env() {
///     Ok(config) => config,
///     Err(e) => error!("Invalid configuration: {}", e),
/// };
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Console warning with a yellow `!`; execution continues.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
