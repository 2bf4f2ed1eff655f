use std::fmt;

use chrono::Utc;
use reqwest::{Client, Url};

use crate::{
    config::Config,
    types::{Token, TokenResponse},
};

pub const READ_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-library-read",
];

pub const WRITE_SCOPES: &[&str] = &[
    "playlist-modify-public",
    "playlist-modify-private",
    "user-library-modify",
];

/// Which scopes a login asks for. Write implies read, since an import
/// snapshots the account before changing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeSet {
    Read,
    #[default]
    All,
}

impl ScopeSet {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("read") => ScopeSet::Read,
            _ => ScopeSet::All,
        }
    }

    pub fn scopes(self) -> Vec<&'static str> {
        match self {
            ScopeSet::Read => READ_SCOPES.to_vec(),
            ScopeSet::All => READ_SCOPES.iter().chain(WRITE_SCOPES).copied().collect(),
        }
    }
}

#[derive(Debug)]
pub enum TokenExchangeError {
    Http(reqwest::Error),
    /// Non-JSON body from the token endpoint.
    InvalidResponse { status: u16 },
    Rejected { status: u16, message: String },
    MissingAccessToken,
}

impl fmt::Display for TokenExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenExchangeError::Http(e) => write!(f, "token request failed: {e}"),
            TokenExchangeError::InvalidResponse { status } => {
                write!(f, "token endpoint returned {status}")
            }
            TokenExchangeError::Rejected { message, .. } => write!(f, "{message}"),
            TokenExchangeError::MissingAccessToken => {
                write!(f, "token endpoint response has no access_token")
            }
        }
    }
}

impl std::error::Error for TokenExchangeError {}

impl From<reqwest::Error> for TokenExchangeError {
    fn from(err: reqwest::Error) -> Self {
        TokenExchangeError::Http(err)
    }
}

/// Builds the provider authorize URL for a PKCE login.
pub fn authorize_url(
    config: &Config,
    state: &str,
    code_challenge: &str,
    scopes: ScopeSet,
) -> Result<String, String> {
    let scope = scopes.scopes().join(" ");
    let params = [
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("scope", scope.as_str()),
        ("redirect_uri", config.callback_uri.as_str()),
        ("state", state),
        ("code_challenge_method", "S256"),
        ("code_challenge", code_challenge),
    ];
    Url::parse_with_params(&config.authorize_url(), &params)
        .map(String::from)
        .map_err(|e| e.to_string())
}

/// Exchanges an authorization code plus its verifier for a token.
pub async fn exchange_code_pkce(
    client: &Client,
    config: &Config,
    code: &str,
    verifier: &str,
) -> Result<Token, TokenExchangeError> {
    request_token(
        client,
        config,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", config.callback_uri.as_str()),
            ("code_verifier", verifier),
        ],
    )
    .await
}

/// Trades a refresh token for a new access token.
///
/// Spotify may omit the refresh token in the answer; the old one stays valid
/// then and is carried over.
pub async fn refresh_token(config: &Config, refresh_token: &str) -> Result<Token, TokenExchangeError> {
    let client = Client::new();
    let mut token = request_token(
        &client,
        config,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
        ],
    )
    .await?;

    if token.refresh_token.is_empty() {
        token.refresh_token = refresh_token.to_string();
    }
    Ok(token)
}

async fn request_token(
    client: &Client,
    config: &Config,
    form: &[(&str, &str)],
) -> Result<Token, TokenExchangeError> {
    let response = client.post(config.token_url()).form(form).send().await?;
    let status = response.status();
    let text = response.text().await?;

    let body: TokenResponse = serde_json::from_str(&text)
        .map_err(|_| TokenExchangeError::InvalidResponse {
            status: status.as_u16(),
        })?;

    if !status.is_success() {
        let message = body
            .error_description
            .or(body.error)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
        return Err(TokenExchangeError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    if let Some(error) = body.error_description.or(body.error) {
        return Err(TokenExchangeError::Rejected {
            status: status.as_u16(),
            message: error,
        });
    }

    let access_token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(TokenExchangeError::MissingAccessToken)?;

    Ok(Token {
        access_token,
        refresh_token: body.refresh_token.unwrap_or_default(),
        scope: body.scope.unwrap_or_default(),
        expires_in: body.expires_in.unwrap_or(3600),
        obtained_at: Utc::now().timestamp().max(0) as u64,
    })
}
