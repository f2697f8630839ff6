// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Landing page, flash messages and database reset.

use axum::{
    extract::State,
    response::{Html, Redirect},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::Result;
use crate::AppState;

pub const FLASH_COOKIE: &str = "flash";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(landing_page))
        .route("/reset", get(reset_database).post(reset_database))
}

/// Severity of a flashed message; doubles as the CSS class suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Info,
    Danger,
}

impl FlashLevel {
    fn as_str(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Danger => "danger",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FlashLevel::Success),
            "info" => Some(FlashLevel::Info),
            "danger" => Some(FlashLevel::Danger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Messages stored in the jar, oldest first. Undecodable cookies read as empty.
pub fn read_flashes(jar: &CookieJar) -> Vec<Flash> {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return Vec::new();
    };
    let Some(decoded) = URL_SAFE_NO_PAD
        .decode(cookie.value())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return Vec::new();
    };

    decoded
        .lines()
        .filter_map(|line| {
            let (level, message) = line.split_once(':')?;
            Some(Flash {
                level: FlashLevel::parse(level)?,
                message: message.to_string(),
            })
        })
        .collect()
}

/// Queue a message for the next landing page render.
pub fn push_flash(jar: CookieJar, level: FlashLevel, message: impl Into<String>) -> CookieJar {
    let mut flashes = read_flashes(&jar);
    flashes.push(Flash {
        level,
        message: message.into().replace(['\r', '\n'], " "),
    });

    let encoded = flashes
        .iter()
        .map(|f| format!("{}:{}", f.level.as_str(), f.message))
        .collect::<Vec<_>>()
        .join("\n");

    jar.add(
        Cookie::build((FLASH_COOKIE, URL_SAFE_NO_PAD.encode(encoded)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Wrap a body fragment in the shared page chrome.
pub fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 0 auto; max-width: 1100px; padding: 20px; }}
nav {{ background: #3c9d5d; padding: 12px; text-align: center; }}
nav a {{ color: white; font-weight: bold; text-decoration: none; }}
.alert {{ padding: 10px; margin: 8px 0; border-radius: 4px; text-align: center; }}
.alert-success {{ background: #d4edda; }}
.alert-info {{ background: #d1ecf1; }}
.alert-danger {{ background: #f8d7da; }}
.actions {{ text-align: center; margin: 20px 0; }}
.actions a, .actions button {{ display: inline-block; margin: 6px; padding: 10px 16px; }}
img {{ max-width: 100%; }}
</style>
</head>
<body>
<nav><a href="/">Strava Weather</a></nav>
{body}
</body>
</html>
"#,
        title = escape_html(title),
        body = body,
    ))
}

/// Landing page: athlete count, pending flashes and the pipeline stages.
async fn landing_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>)> {
    let athlete_count = state.db.count_accounts()?;
    let flashes = read_flashes(&jar);

    let mut body = String::new();
    body.push_str("<header style=\"text-align: center\">\n");
    body.push_str("<h2>How weather conditions affect distance &amp; moving time</h2>\n");
    let _ = writeln!(
        body,
        "<p><strong>Total Registered Athletes:</strong> {}</p>\n</header>",
        athlete_count
    );

    for flash in &flashes {
        let _ = writeln!(
            body,
            "<div class=\"alert alert-{}\">{}</div>",
            flash.level.as_str(),
            escape_html(&flash.message)
        );
    }

    body.push_str(
        r#"<div class="actions">
<a href="/authorize">1. Authorize Strava</a>
<a href="/activities">2. Fetch Activities</a>
<a href="/process_weather">3. Process Weather</a>
<a href="/weather_graphs">4. View Weather Graphs</a>
<a href="/weather_graphs?grouping=description">4b. Graphs by Description</a>
<form method="post" action="/reset" style="display: inline">
<button type="submit">Reset Database</button>
</form>
</div>
"#,
    );

    let jar = if flashes.is_empty() {
        jar
    } else {
        jar.remove(Cookie::build(FLASH_COOKIE).path("/"))
    };
    Ok((jar, page("Strava Weather", &body)))
}

/// Delete the database file and start over with an empty schema.
async fn reset_database(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let jar = match state.db.reset() {
        Ok(true) => push_flash(jar, FlashLevel::Success, "Database reset successfully!"),
        Ok(false) => push_flash(
            jar,
            FlashLevel::Info,
            "Database file does not exist, nothing to reset.",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database reset failed");
            push_flash(jar, FlashLevel::Danger, format!("Error resetting database: {}", e))
        }
    };
    (jar, Redirect::to("/"))
}
