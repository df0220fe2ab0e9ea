//! HTTP Basic authentication for every monitor route.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;

use crate::handlers::ApiState;

const REALM: &str = r#"Basic realm="UDP Punch Monitor""#;

/// The single user allowed to view the monitor.
#[derive(Debug, Clone)]
pub struct Credentials {
    // "user:password", the form Basic auth carries on the wire
    expected: Vec<u8>,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            expected: format!("{username}:{password}").into_bytes(),
        }
    }

    /// Check an `Authorization` header value.
    pub fn verify(&self, header_value: &str) -> bool {
        let Some((scheme, encoded)) = header_value.trim().split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
            Ok(decoded) => constant_time_eq(&decoded, &self.expected),
            Err(_) => false,
        }
    }
}

// Length leaks; contents do not.
#[inline(never)]
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Middleware: 401 with a Basic challenge unless the request carries the
/// configured credentials.
pub async fn require_basic_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| state.credentials.verify(v));

    if !authorized {
        tracing::debug!(path = %request.uri().path(), "monitor request without valid credentials");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, REALM)],
            "authentication required",
        )
            .into_response();
    }

    next.run(request).await
}
