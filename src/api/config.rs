use axum::{Json, extract::State};

use super::AppState;
use crate::config::Config;

pub async fn config(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.as_ref().clone())
}
