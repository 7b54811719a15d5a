//! Gate's own endpoints

use crate::AppState;
use axum::{extract::State, response::Json};
use serde::Serialize;

/// Body of `GET /_gate/status`
#[derive(Debug, Serialize)]
pub struct GateStatus {
    pub status: String,
    pub enforcement: bool,
    /// Number of exempt accounts; the addresses themselves are not exposed
    pub exempt_users: usize,
    pub upstream: String,
    pub version: String,
}

/// Gate health and enforcement state
pub async fn gate_status(State(state): State<AppState>) -> Json<GateStatus> {
    let config = state.gate.config();

    Json(GateStatus {
        status: "ok".to_string(),
        enforcement: config.require_2fa,
        exempt_users: config.exempt.len(),
        upstream: state.proxy.upstream().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
