//! The 403 returned to callers that still need to set up 2FA

use crate::templates::TwoFactorRequiredTemplate;
use askama::Template;
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

pub const TWO_FACTOR_MESSAGE: &str = "Two-Factor Authentication is required for your account. \
    Please configure 2FA in your profile settings before continuing.";

/// Where users go to configure a second factor
pub const PROFILE_PATH: &str = "/profile";

const PAGE_TITLE: &str = "Two-Factor Authentication Required";
const API_PATH_PREFIXES: &[&str] = &["/api/", "/data/", "/actions/"];

/// JSON body for API callers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TwoFactorRequired {
    pub error: bool,
    pub message: String,
    #[serde(rename = "2fa_required")]
    pub two_factor_required: bool,
    pub redirect_to: String,
    pub user_email: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Whether the caller expects JSON rather than a page
pub fn is_api_request(path: &str, headers: &HeaderMap) -> bool {
    API_PATH_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || header_str(headers, "content-type").contains("application/json")
        || header_str(headers, "accept").starts_with("application/json")
        || header_str(headers, "x-requested-with").contains("XMLHttpRequest")
}

/// A rendered block: status, content type and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl BlockResponse {
    pub fn two_factor_required(user_email: &str, path: &str, headers: &HeaderMap) -> Self {
        if is_api_request(path, headers) {
            Self::json(user_email)
        } else {
            Self::html()
        }
    }

    fn json(user_email: &str) -> Self {
        let payload = TwoFactorRequired {
            error: true,
            message: TWO_FACTOR_MESSAGE.to_string(),
            two_factor_required: true,
            redirect_to: PROFILE_PATH.to_string(),
            user_email: user_email.to_string(),
        };
        let body = serde_json::to_string(&payload).unwrap_or_else(|e| {
            warn!("Failed to serialize block response: {}", e);
            String::from(r#"{"error":true,"2fa_required":true}"#)
        });

        Self {
            status: StatusCode::FORBIDDEN,
            content_type: "application/json",
            body,
        }
    }

    fn html() -> Self {
        let page = TwoFactorRequiredTemplate {
            title: PAGE_TITLE,
            message: TWO_FACTOR_MESSAGE,
            redirect_to: PROFILE_PATH,
        };
        let body = page.render().unwrap_or_else(|e| {
            warn!("Failed to render block page: {}", e);
            TWO_FACTOR_MESSAGE.to_string()
        });

        Self {
            status: StatusCode::FORBIDDEN,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }
}

impl IntoResponse for BlockResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}
