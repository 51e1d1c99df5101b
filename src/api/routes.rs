//! Router assembly: public auth routes, gated routes, health check.

use crate::auth::{
    api as auth_api, auth_middleware, middleware::extract_claims, AuthError, AuthService,
};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimitLayer};
use anyhow::{Context, Result};
use axum::{
    extract::Request,
    http::{
        header::{self, HeaderValue},
        Method,
    },
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};

/// Build the full application router.
///
/// The rate limiter reads the peer address from `ConnectInfo`, so a router
/// built with one must be served with connect info. It sits inside the CORS
/// and security-header layers so that 429 responses carry those headers too.
pub fn build_router(
    service: AuthService,
    cors_origin: &str,
    rate_limit: Option<RateLimitLayer>,
) -> Result<Router> {
    let origin = HeaderValue::from_str(cors_origin)
        .with_context(|| format!("Invalid CORS origin '{cors_origin}'"))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_router = Router::new()
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/login", post(auth_api::login));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::get_current_user))
        .route("/api/protected", get(protected))
        .route_layer(middleware::from_fn_with_state(
            service.clone(),
            auth_middleware,
        ));

    let public_routes = Router::new().route("/health", get(health_check));

    let mut app = Router::new()
        .merge(public_routes)
        .merge(auth_router)
        .merge(protected_routes)
        .with_state(service);

    if let Some(limiter) = rate_limit {
        app = app.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    let app = app.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(request_logging))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            ))
            .layer(cors),
    );

    Ok(app)
}

/// Example gated resource - GET /api/protected
async fn protected(req: Request) -> Result<Json<Value>, AuthError> {
    let claims = extract_claims(&req)
        .ok_or_else(|| AuthError::Internal("auth gate did not attach claims".to_string()))?;

    Ok(Json(json!({
        "message": format!("Secure access for {}", claims.email),
    })))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
