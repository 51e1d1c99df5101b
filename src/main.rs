//! Keygate - credential authentication service
//! Mission: Register users, issue bearer tokens, gate protected routes

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use keygate::{
    api::build_router,
    auth::{AuthService, CredentialStore, JwtHandler, MemoryUserStore, PasswordHasher, UserStore},
    config::{Config, StoreLocation},
    middleware::{RateLimitConfig, RateLimitLayer},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(about = "Credential authentication service issuing JWT bearer tokens")]
struct Args {
    /// Deployment environment (development or production)
    #[arg(long, env = "APP_ENV")]
    env: Option<String>,

    /// Listening port, overrides PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    let _ = dotenv();
    init_tracing();

    let args = Args::parse();
    let port_override = args.port.map(|p| p.to_string());
    let config = Config::from_env(&[
        ("APP_ENV", args.env.as_deref()),
        ("PORT", port_override.as_deref()),
    ])
    .context("Invalid configuration")?;

    info!("🚀 Keygate starting ({} environment)", config.env);
    info!("⚙️  {:?}", config);

    let service = build_auth_service(&config)?;

    let limiter = RateLimitLayer::new(RateLimitConfig {
        max_requests: config.rate_limit_max,
        window: config.rate_limit_window,
    });
    tokio::spawn(rate_limit_cleanup(limiter.clone()));

    let app = build_router(service, &config.cors_origin, Some(limiter))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("👋 Keygate stopped");
    Ok(())
}

fn build_auth_service(config: &Config) -> Result<AuthService> {
    let store: Arc<dyn CredentialStore> = match &config.store {
        StoreLocation::Sqlite(path) => Arc::new(UserStore::new(path, config.store_timeout)?),
        StoreLocation::Memory => {
            warn!("⚠️  Using in-memory user store, accounts are lost on restart");
            Arc::new(MemoryUserStore::new())
        }
    };

    let jwt_handler = Arc::new(JwtHandler::with_settings(
        &config.jwt_secret,
        config.jwt_algorithm,
        config.token_ttl,
    ));

    info!(
        "🔐 Authentication initialized (bcrypt cost {}, token ttl {}s)",
        config.bcrypt_cost,
        config.token_ttl.num_seconds()
    );

    Ok(AuthService::new(
        store,
        PasswordHasher::new(config.bcrypt_cost),
        jwt_handler,
    ))
}

/// Initialize tracing with env-filter support
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn rate_limit_cleanup(limiter: RateLimitLayer) {
    let mut ticker = interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        limiter.cleanup();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
