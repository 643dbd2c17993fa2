use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub region: String,
    pub gateway_configured: bool,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let gateway_configured = state.config.gateway.profile_id > 0
        && !state.config.gateway.server_key.is_empty()
        && !state.config.gateway.callback_base_url.is_empty();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version,
        environment: state.config.server.environment.clone(),
        region: format!("{:?}", state.config.gateway.region),
        gateway_configured,
    };

    Ok(Json(response))
}
