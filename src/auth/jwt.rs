//! JWT Token Handler
//! Mission: Generate and validate signed, time-limited bearer tokens

use crate::auth::models::{Claims, User};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::debug;

/// Default token lifetime: one hour
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key and the one-hour default lifetime
    pub fn new(secret: &str) -> Self {
        Self::with_settings(secret, Algorithm::HS256, Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    pub fn with_settings(secret: &str, algorithm: Algorithm, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user: &User) -> Result<String, TokenError> {
        self.generate_token_at(user, Utc::now())
    }

    /// Generate a token as if issued at `now`
    pub fn generate_token_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign an already-built claim set
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        debug!(
            "Generating JWT for {} ({}), expires at {}",
            claims.email, claims.sub, claims.exp
        );

        let token = encode(&Header::new(self.algorithm), claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_token_at(token, Utc::now())
    }

    /// Validate against an explicit clock.
    ///
    /// Signature, algorithm and claim shape are checked by `jsonwebtoken`;
    /// expiry is checked here against `now` with no leeway.
    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                debug!(error = %e, "Rejected JWT");
                TokenError::Invalid
            })?
            .claims;

        if now.timestamp() > claims.exp {
            debug!("Rejected expired JWT for {}", claims.email);
            return Err(TokenError::Expired);
        }

        debug!("Validated JWT for {}", claims.email);

        Ok(claims)
    }
}
