//! Environment loading and the immutable application [`Config`].
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory or in `<data_local_dir>/myspotbackup/.env`.
//! [`Config::from_env`] validates everything up front and reports all
//! problems at once so a misconfigured server never starts serving.

use std::{env, fmt, path::PathBuf, time::Duration};

use reqwest::Url;
use serde::Serialize;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SLOWDOWN_MS: u64 = 100;
pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Loads `.env` files into the process environment.
///
/// The working directory's `.env` wins over the one in the data directory
/// because `dotenv` never overrides variables that are already set.
pub async fn load_env() -> Result<(), String> {
    let _ = dotenv::dotenv();

    let path = env_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("myspotbackup/.env");
    path
}

/// Invalid configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub issues: Vec<String>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.issues.join("; "))
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration, shared read-only after load.
///
/// Serializes to the public `/config` JSON. The remote service URLs are not
/// part of that document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Config {
    pub port: u16,
    pub uri: String,
    pub login_url: String,
    pub callback_uri: String,
    pub client_id: String,
    pub slowdown_import: u64,
    pub slowdown_export: u64,
    #[serde(skip)]
    pub api_url: String,
    #[serde(skip)]
    pub accounts_url: String,
}

impl Config {
    /// Builds the config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds and validates a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut issues = Vec::new();

        let client_id = var("CLIENT_ID").map(|c| c.trim().to_string()).unwrap_or_default();
        if client_id.is_empty() {
            issues.push("CLIENT_ID must be set".to_string());
        }

        // the default PUBLIC_URI needs the port, but PORT is reported after it
        let port = var("PORT").map(|raw| raw.trim().parse::<u16>().ok().filter(|p| *p > 0));
        let uri = var("PUBLIC_URI")
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{}", port.flatten().unwrap_or(DEFAULT_PORT)));
        if Url::parse(&uri).is_err() {
            issues.push("PUBLIC_URI must be a valid URL".to_string());
        }

        let port = match port {
            None => DEFAULT_PORT,
            Some(Some(port)) => port,
            Some(None) => {
                issues.push("PORT must be a positive integer".to_string());
                DEFAULT_PORT
            }
        };

        let slowdown_import = parse_slowdown(var("SLOWDOWN_IMPORT"), "SLOWDOWN_IMPORT", &mut issues);
        let slowdown_export = parse_slowdown(var("SLOWDOWN_EXPORT"), "SLOWDOWN_EXPORT", &mut issues);

        let api_url = var("SPOTIFY_API_URL")
            .unwrap_or_else(|| DEFAULT_SPOTIFY_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let accounts_url = var("SPOTIFY_ACCOUNTS_URL")
            .unwrap_or_else(|| DEFAULT_SPOTIFY_ACCOUNTS_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !issues.is_empty() {
            return Err(ConfigError { issues });
        }

        Ok(Config {
            port,
            login_url: format!("{uri}/login"),
            callback_uri: format!("{uri}/callback"),
            uri,
            client_id,
            slowdown_import,
            slowdown_export,
            api_url,
            accounts_url,
        })
    }

    pub fn import_delay(&self) -> Duration {
        Duration::from_millis(self.slowdown_import)
    }

    pub fn export_delay(&self) -> Duration {
        Duration::from_millis(self.slowdown_export)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.accounts_url)
    }

    /// Token endpoint of the accounts service.
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_url)
    }

    pub fn server_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Parses a slowdown given in (possibly fractional) milliseconds, rounded to
/// whole milliseconds.
fn parse_slowdown(raw: Option<String>, key: &str, issues: &mut Vec<String>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_SLOWDOWN_MS;
    };

    match raw.trim().parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms >= 0.0 => ms.round() as u64,
        _ => {
            issues.push(format!("{key} must be a non-negative number"));
            DEFAULT_SLOWDOWN_MS
        }
    }
}
