//! Authentication Middleware
//! Mission: Gate protected endpoints behind a valid bearer token

use crate::auth::{models::Claims, service::AuthService};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Auth middleware that validates JWT tokens.
///
/// On success the decoded [`Claims`] are inserted into the request
/// extensions for downstream handlers.
pub async fn auth_middleware(
    State(service): State<AuthService>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let claims = authorize(&service, req.headers())?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Pull the token out of `Authorization: Bearer <token>` and verify it
pub fn authorize(service: &AuthService, headers: &HeaderMap) -> Result<Claims, GateError> {
    let token = bearer_token(headers).ok_or(GateError::MissingToken)?;

    service.whoami(token).map_err(|e| {
        debug!(error = %e, "Bearer token rejected");
        GateError::Forbidden
    })
}

/// `None` when the header is absent, not ASCII, not a Bearer scheme, or empty.
/// The scheme name is matched case-insensitively (RFC 7235).
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Extract claims from request (use after auth middleware)
pub fn extract_claims(req: &Request) -> Option<&Claims> {
    req.extensions().get::<Claims>()
}

/// Gate rejections
#[derive(Debug, Error)]
pub enum GateError {
    #[error("missing or malformed bearer token")]
    MissingToken,
    #[error("invalid or expired token")]
    Forbidden,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            GateError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            GateError::Forbidden => (StatusCode::FORBIDDEN, "Invalid or expired token"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
