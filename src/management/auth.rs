use std::path::PathBuf;

use chrono::Utc;

use crate::{config::Config, spotify, types::Token};

/// Seconds before the real expiry at which a token is treated as expired.
const EXPIRY_MARGIN_SECS: u64 = 240;

/// On-disk cache of the OAuth token used by the CLI commands.
pub struct TokenManager {
    token: Token,
    path: PathBuf,
}

impl TokenManager {
    /// Token manager that caches to `<data_local_dir>/myspotbackup/cache/token.json`.
    pub fn new(token: Token) -> Self {
        TokenManager {
            token,
            path: Self::token_path(),
        }
    }

    pub fn with_path(token: Token, path: PathBuf) -> Self {
        TokenManager { token, path }
    }

    /// Loads the cached token from the default location.
    pub async fn load() -> Result<Self, String> {
        Self::load_from(Self::token_path()).await
    }

    pub async fn load_from(path: PathBuf) -> Result<Self, String> {
        let content = async_fs::read_to_string(&path)
            .await
            .map_err(|e| e.to_string())?;
        let token: Token = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self { token, path })
    }

    /// Writes the token to the cache file.
    pub async fn persist(&self) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(&self.token).map_err(|e| e.to_string())?;
        async_fs::write(&self.path, json)
            .await
            .map_err(|e| e.to_string())
    }

    /// Returns an access token that is not about to expire.
    ///
    /// An expired token is refreshed with the refresh-token grant and the new
    /// token is written back to the cache.
    pub async fn get_valid_token(&mut self, config: &Config) -> Result<String, String> {
        if self.is_expired() {
            if self.token.refresh_token.is_empty() {
                return Err("cached token expired and cannot be refreshed".to_string());
            }
            let refreshed = spotify::auth::refresh_token(config, &self.token.refresh_token)
                .await
                .map_err(|e| e.to_string())?;
            self.token = refreshed;
            self.persist().await?;
        }

        Ok(self.token.access_token.clone())
    }

    /// True when the token expires within the next four minutes.
    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp().max(0) as u64;
        now + EXPIRY_MARGIN_SECS >= self.token.obtained_at + self.token.expires_in
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }

    fn token_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("myspotbackup/cache/token.json");
        path
    }
}
