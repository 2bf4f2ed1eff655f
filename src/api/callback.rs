use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use super::{AppState, login::found};
use crate::{
    info,
    management::AuthStateStatus,
    spotify::auth::exchange_code_pkce,
    utils, warning,
};

const MISSING_STATE: &str = "OAuth state is missing or invalid. Please restart the login flow.";
const EXPIRED_STATE: &str = "OAuth state is expired. Please restart the login flow.";

const DELIVERY_PAGE: &str = r##"<!doctype html><html><body><script>
window.onload = () => {
  const opener = window.opener;
  const token = __TOKEN__;
  let targetOrigin = __ORIGIN__;
  const hash = "#token=" + encodeURIComponent(token);

  try {
    if (opener && opener.location && opener.location.origin) {
      targetOrigin = opener.location.origin;
    }
  } catch (err) {
    console.warn("unable to read opener origin", err);
  }

  if (opener && !opener.closed) {
    try {
      opener.postMessage({ token }, targetOrigin);
      window.close();
      return;
    } catch (err) {
      console.warn("postMessage to opener failed", err);
    }
  }

  try {
    window.location.replace("/" + hash);
  } catch (err) {
    console.warn("unable to redirect with token", err);
  }
};
</script><p>Login complete. You can close this window.</p><p>If it does not close automatically, return to the original tab.</p><p>If nothing happens, <a href="/#token=__TOKEN_HREF__">click here to continue</a>.</p></body></html>"##;

pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        return found("/#error=missing_code".to_string());
    };

    let Some(oauth_state) = params.get("state").filter(|s| !s.is_empty()) else {
        return bad_request(MISSING_STATE.to_string());
    };

    let entry = match state.auth_states.take(oauth_state) {
        AuthStateStatus::Valid(entry) => entry,
        AuthStateStatus::Missing => return bad_request(MISSING_STATE.to_string()),
        AuthStateStatus::Expired => return bad_request(EXPIRED_STATE.to_string()),
    };

    let token = match exchange_code_pkce(&state.http, &state.config, code, &entry.code_verifier)
        .await
    {
        Ok(token) => token,
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            return bad_request(format!(
                "Error during token exchange: {}. Restart your session and try again. <a href=\"/\">Home Page</a>",
                escape_html(&e.to_string())
            ));
        }
    };

    if let Some(sink) = &state.token_sink {
        *sink.lock().await = Some(token.clone());
    }
    info!("Login completed, delivering token to the browser");

    let fallback_origin = utils::origin_of(&state.config.uri).unwrap_or_default();
    (
        [
            (header::CACHE_CONTROL, "no-store, max-age=0"),
            (header::PRAGMA, "no-cache"),
        ],
        Html(token_delivery_page(&token.access_token, &fallback_origin)),
    )
        .into_response()
}

/// HTML page that posts the token to the opener window, scoped to the
/// opener's origin, or navigates to `/#token=...` when there is no opener.
///
/// `fallback_origin` must be an origin (scheme, host, port), never a full URI.
pub fn token_delivery_page(token: &str, fallback_origin: &str) -> String {
    DELIVERY_PAGE
        .replace("__TOKEN_HREF__", &urlencoding::encode(token))
        .replace("__TOKEN__", &script_string(token))
        .replace("__ORIGIN__", &script_string(fallback_origin))
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Html(message)).into_response()
}

/// JSON string literal that cannot close the surrounding `<script>`.
fn script_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
