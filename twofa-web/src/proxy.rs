//! Forwarding of gated requests to the host application
//!
//! Bodies are streamed in both directions; the gate never holds a whole
//! upload or download in memory.

use crate::{AppState, WebError, WebResult};
use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection-scoped headers that must not be relayed
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

fn is_forwardable(name: &HeaderName) -> bool {
    !HOP_BY_HOP.contains(&name.as_str()) && name != header::HOST
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter().filter(|(name, _)| is_forwardable(name)) {
        to.append(name.clone(), value.clone());
    }
}

/// Request headers for the upstream call, with the `x-forwarded-*` set
/// describing the original client
fn upstream_headers(parts: &Parts) -> HeaderMap {
    let mut headers = HeaderMap::new();
    copy_headers(&parts.headers, &mut headers);

    if let Some(host) = parts.headers.get(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }

    if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        let client = peer.ip().to_string();
        let chain = match parts
            .headers
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(earlier) => format!("{}, {}", earlier, client),
            None => client,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    // A TLS terminator in front of the gate already set it
    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }

    headers
}

fn proxy_error(status: StatusCode, error: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "message": message,
        })),
    )
        .into_response()
}

/// HTTP client bound to one upstream base URL
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    client: reqwest::Client,
    upstream: String,
}

impl UpstreamProxy {
    pub fn new(upstream_url: &str) -> WebResult<Self> {
        let parsed = reqwest::Url::parse(upstream_url)
            .map_err(|e| WebError::Config(format!("Invalid upstream URL '{}': {}", upstream_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(WebError::Config(format!(
                "Upstream URL must be http or https: {}",
                upstream_url
            )));
        }

        // Redirects belong to the browser, not the proxy
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WebError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            upstream: upstream_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Upstream URL for an incoming request URI (path and query kept)
    pub fn target_url(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.upstream, path_and_query)
    }

    pub async fn forward(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let headers = upstream_headers(&parts);
        let url = self.target_url(&parts.uri);
        debug!("Forwarding {} {}", parts.method, url);

        let mut outgoing = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers);
        if body.size_hint().exact() != Some(0) {
            outgoing = outgoing.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = match outgoing.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Upstream request {} {} failed: {}", parts.method, url, e);
                return proxy_error(
                    StatusCode::BAD_GATEWAY,
                    "bad_gateway",
                    format!("Upstream {} is unavailable", self.upstream),
                );
            }
        };

        let status = upstream.status();
        let mut response_headers = HeaderMap::new();
        copy_headers(upstream.headers(), &mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        response
    }
}

/// Fallback handler: everything the gate let through goes upstream
pub async fn forward_request(State(state): State<AppState>, request: Request) -> Response {
    state.proxy.forward(request).await
}
