use std::collections::HashMap;

use super::state::ServerState;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::debug;

/// Identity attached to a request whose token matched a configured user.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: String,
    pub token: String,
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

fn extract_session_token_from_cookies(jar: &CookieJar) -> Option<String> {
    jar.get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .map(|s| s.to_string())
}

fn extract_session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(HEADER_SESSION_TOKEN_KEY)?;
    let value = String::from_utf8_lossy(value.as_bytes());
    let token = value.strip_prefix("Bearer ").unwrap_or(&value).trim();
    Some(token.to_string())
}

fn resolve_session(
    tokens: &HashMap<String, String>,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Option<Session> {
    let token = match extract_session_token_from_cookies(jar)
        .or_else(|| extract_session_token_from_headers(headers))
    {
        None => {
            debug!("No token in cookies nor headers.");
            return None;
        }
        Some(x) => x,
    };

    match tokens.get(&token) {
        Some(user) => {
            debug!("Session token resolved to user {}", user);
            Some(Session {
                user: user.clone(),
                token,
            })
        }
        None => {
            debug!("Unknown session token");
            None
        }
    }
}

/// Attach a [`Session`] to the request extensions when the request carries a
/// known token. Requests without one pass through untouched.
pub async fn attach_session(
    State(state): State<ServerState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(session) = resolve_session(&state.config.session_tokens, &jar, request.headers())
    {
        request.extensions_mut().insert(session);
    }
    next.run(request).await
}
