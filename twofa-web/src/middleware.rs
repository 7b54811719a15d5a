//! Axum middleware wrapping the 2FA gate

use crate::gate::{GateDecision, TwoFactorGate};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Run the gate before the inner service.
///
/// Mount with `axum::middleware::from_fn_with_state(gate, two_factor_gate)`.
pub async fn two_factor_gate(
    State(gate): State<Arc<TwoFactorGate>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let decision = gate
        .evaluate(&parts.method, parts.uri.path(), &parts.headers)
        .await;

    match decision {
        GateDecision::Allow(reason) => {
            debug!("{} {} allowed ({})", parts.method, parts.uri.path(), reason);
            next.run(Request::from_parts(parts, body)).await
        }
        GateDecision::Block(block) => block.into_response(),
    }
}
