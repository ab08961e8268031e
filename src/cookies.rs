use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "warbler_session";
pub const FLASH_COOKIE: &str = "warbler_flash";
pub const CSRF_COOKIE: &str = "warbler_csrf";

/// Parse a Cookie header into name/value pairs.
pub fn parse(header: Option<&str>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(raw) = header {
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                out.insert(name.to_string(), value.to_string());
            }
        }
    }
    out
}

/// Set-Cookie value carrying the session token.
pub fn session(token: &str, max_age_hours: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age_hours * 3600
    )
}

/// Set-Cookie value that removes a cookie.
pub fn clear(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

/// Set-Cookie value carrying the request-forgery token.
pub fn csrf(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", CSRF_COOKIE, token)
}

pub fn new_csrf_token() -> String {
    Uuid::new_v4().to_string()
}

/// One-shot banner carried across a redirect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

impl Flash {
    pub fn new(category: &str, message: &str) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn danger(message: &str) -> Self {
        Self::new("danger", message)
    }

    pub fn success(message: &str) -> Self {
        Self::new("success", message)
    }

    pub fn info(message: &str) -> Self {
        Self::new("info", message)
    }
}

/// Set-Cookie value carrying a pending flash.
pub fn flash(flash: &Flash) -> String {
    let payload = serde_json::to_string(flash).unwrap_or_default();
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(&payload)
    )
}

/// Decode the pending flash from parsed request cookies, if any.
pub fn take_flash(cookies: &HashMap<String, String>) -> Option<Flash> {
    let raw = cookies.get(FLASH_COOKIE)?;
    let decoded = urlencoding::decode(raw).ok()?;
    serde_json::from_str(&decoded).ok()
}
