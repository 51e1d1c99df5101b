//! Process-wide configuration, built once at startup.

use anyhow::{bail, Context, Result};
use jsonwebtoken::Algorithm;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::jwt::DEFAULT_TOKEN_TTL_SECS;
use crate::auth::password::DEFAULT_BCRYPT_COST;

/// Minimum signing secret length in bytes (HS256 key size)
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            AppEnv::Development => 5000,
            AppEnv::Production => 8080,
        }
    }
}

impl FromStr for AppEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => bail!("Unknown APP_ENV '{other}' (expected development or production)"),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where user records live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Sqlite(String),
    Memory,
}

impl StoreLocation {
    /// Accepts `sqlite://<path>`, `memory://`, or a bare SQLite file path
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url == "memory://" || url == "memory" {
            return Ok(StoreLocation::Memory);
        }
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        if path.is_empty() {
            bail!("DATABASE_URL does not name a database file");
        }
        Ok(StoreLocation::Sqlite(path.to_string()))
    }
}

#[derive(Clone)]
pub struct Config {
    pub env: AppEnv,
    pub port: u16,
    pub store: StoreLocation,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub store_timeout: Duration,
    pub cors_origin: String,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("env", &self.env)
            .field("port", &self.port)
            .field("store", &self.store)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("token_ttl", &self.token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("store_timeout", &self.store_timeout)
            .field("cors_origin", &self.cors_origin)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window", &self.rate_limit_window)
            .finish()
    }
}

impl Config {
    /// Read the process environment; a `Some` override (CLI flag) wins over its variable.
    pub fn from_env(overrides: &[(&str, Option<&str>)]) -> Result<Self> {
        Self::from_lookup(|key| {
            overrides
                .iter()
                .find_map(|(k, v)| (*k == key).then_some(*v).flatten())
                .map(str::to_string)
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let env = match var("APP_ENV") {
            Some(v) => v.parse()?,
            None => AppEnv::Development,
        };

        let port = match var("PORT") {
            Some(v) => v.trim().parse().with_context(|| format!("Invalid PORT '{v}'"))?,
            None => env.default_port(),
        };

        let store = match (var("DATABASE_URL"), env) {
            (Some(url), _) => StoreLocation::parse(&url)?,
            (None, AppEnv::Development) => StoreLocation::Sqlite("keygate_auth.db".to_string()),
            (None, AppEnv::Production) => bail!("DATABASE_URL must be set in production"),
        };

        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let jwt_algorithm = match var("JWT_ALGORITHM") {
            Some(v) => parse_algorithm(&v)?,
            None => Algorithm::HS256,
        };

        let ttl_secs: i64 = parse_or(&var, "JWT_EXPIRATION_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        if ttl_secs <= 0 {
            bail!("JWT_EXPIRATION_SECS must be positive");
        }

        let bcrypt_cost: u32 = parse_or(&var, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }

        let store_timeout_ms: u64 = parse_or(&var, "STORE_TIMEOUT_MS", 5000)?;
        let rate_limit_max: u32 = parse_or(&var, "RATE_LIMIT_MAX", 100)?;
        let rate_limit_window_secs: u64 = parse_or(&var, "RATE_LIMIT_WINDOW_SECS", 3600)?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            env,
            port,
            store,
            jwt_secret,
            jwt_algorithm,
            token_ttl: chrono::Duration::seconds(ttl_secs),
            bcrypt_cost,
            store_timeout: Duration::from_millis(store_timeout_ms),
            cors_origin,
            rate_limit_max,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
        })
    }
}

fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} '{v}'")),
        None => Ok(default),
    }
}

fn parse_algorithm(value: &str) -> Result<Algorithm> {
    match value.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => bail!("Unsupported JWT_ALGORITHM '{other}' (expected HS256, HS384 or HS512)"),
    }
}
