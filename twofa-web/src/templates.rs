//! Server-rendered pages using Askama

use askama::Template;

/// Shown to browsers when a request is blocked for missing 2FA
#[derive(Template)]
#[template(path = "two_factor_required.html")]
pub struct TwoFactorRequiredTemplate<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub redirect_to: &'a str,
}
