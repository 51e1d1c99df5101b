//! Authentication API Endpoints
//! Mission: Provide register, login and current-identity endpoints

use crate::auth::{
    middleware::extract_claims,
    models::{CredentialsRequest, LoginResponse, MeResponse, RegisterResponse, UserResponse},
    service::{AuthError, AuthService},
};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info, warn};

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(service): State<AuthService>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let Json(payload) = payload.map_err(malformed_body)?;

    let user = service.register(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered".to_string(),
            user: UserResponse::from_user(&user),
        }),
    ))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(service): State<AuthService>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Json(payload) = payload.map_err(malformed_body)?;

    info!("🔐 Login attempt");
    let token = service.login(payload).await?;

    Ok(Json(LoginResponse { token }))
}

/// Get current user info - GET /api/auth/me
/// Runs behind the auth gate; the identity comes straight from the verified claims.
pub async fn get_current_user(req: Request) -> Result<Json<MeResponse>, AuthError> {
    let claims = extract_claims(&req)
        .cloned()
        .ok_or_else(|| AuthError::Internal("auth gate did not attach claims".to_string()))?;

    Ok(Json(MeResponse { user: claims }))
}

fn malformed_body(rejection: JsonRejection) -> AuthError {
    warn!("Rejected request body: {}", rejection.body_text());
    AuthError::MalformedBody
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Validation(errors) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors })))
                    .into_response();
            }
            AuthError::MalformedBody => (StatusCode::BAD_REQUEST, "Malformed JSON body"),
            AuthError::DuplicateUser => (StatusCode::BAD_REQUEST, "User already exists"),
            AuthError::UserNotFound => (StatusCode::BAD_REQUEST, "User not found"),
            AuthError::InvalidCredentials => (StatusCode::BAD_REQUEST, "Invalid password"),
            AuthError::Token(_) => (StatusCode::FORBIDDEN, "Invalid or expired token"),
            AuthError::Store(e) => {
                error!("Credential store failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AuthError::Internal(e) => {
                error!("Internal auth failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
