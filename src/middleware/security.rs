// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security and caching headers middleware.

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Pages load their own report images and inline styles, nothing else.
/// Forms may post back here or go to Strava's authorize page.
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; \
     form-action 'self' https://www.strava.com; frame-ancestors 'none'";

/// Add security headers to all responses.
///
/// Report files under `/static` are rewritten on every run, so they must be
/// revalidated; everything else is dynamic and never cached. HSTS is left to
/// whatever terminates TLS in front of the app.
pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let is_report_file = req.uri().path().starts_with("/static/");
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(if is_report_file { "no-cache" } else { "no-store" }),
    );

    response
}
