//! Route definitions for the gate server

use crate::{handlers, AppState};
use axum::{routing::get, Router};

/// Routes served by the gate itself rather than the upstream
pub fn gate_routes() -> Router<AppState> {
    Router::new().route("/_gate/status", get(handlers::gate_status))
}
