use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::{
    spotify::auth::{self, ScopeSet},
    utils, warning,
};

pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if state.config.client_id.trim().is_empty() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing CLIENT_ID configuration",
        )
            .into_response();
    }

    let code_verifier = utils::generate_code_verifier(state.random.as_ref());
    let oauth_state = utils::generate_state(state.random.as_ref());
    let code_challenge = utils::generate_code_challenge(&code_verifier);
    let scopes = ScopeSet::from_query(params.get("scopeType").map(String::as_str));

    let authorize_url =
        match auth::authorize_url(&state.config, &oauth_state, &code_challenge, scopes) {
            Ok(url) => url,
            Err(e) => {
                warning!("Cannot build authorize url: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid authorize url")
                    .into_response();
            }
        };

    state.auth_states.store_state(oauth_state, code_verifier);
    found(authorize_url)
}

/// 302 Found; axum's `Redirect` only offers 303, 307 and 308.
pub(super) fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
