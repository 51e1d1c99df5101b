//! Registration / Login Flows
//! Mission: Orchestrate validation, uniqueness, hashing and token issuance

use crate::auth::{
    jwt::{JwtHandler, TokenError},
    models::{Claims, CredentialsRequest, User},
    password::PasswordHasher,
    user_store::{CredentialStore, StoreError},
    validation::{validate_credentials, FieldErrors},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("malformed request body")]
    MalformedBody,
    #[error("user already exists")]
    DuplicateUser,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Token(TokenError),
    #[error(transparent)]
    Store(StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => AuthError::DuplicateUser,
            other => AuthError::Store(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(err) => AuthError::Internal(format!("token signing failed: {err}")),
            other => AuthError::Token(other),
        }
    }
}

/// Auth flows over an injected store, hasher and token handler
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    jwt_handler: Arc<JwtHandler>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        jwt_handler: Arc<JwtHandler>,
    ) -> Self {
        Self {
            store,
            hasher,
            jwt_handler,
        }
    }

    /// Register a new account. No token is issued here.
    pub async fn register(&self, req: CredentialsRequest) -> Result<User, AuthError> {
        let creds = validate_credentials(req).map_err(AuthError::Validation)?;

        if self.store.find_by_email(&creds.email).await?.is_some() {
            warn!("Registration rejected, email already taken: {}", creds.email);
            return Err(AuthError::DuplicateUser);
        }

        let hasher = self.hasher;
        let password = creds.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::Internal(format!("hashing failed: {e}")))?;

        // The store's unique constraint still decides if a concurrent
        // registration slipped in after the check above.
        let user = self.store.create(&creds.email, password_hash).await?;

        info!("✅ Registered user: {} ({})", user.email, user.id);
        Ok(user)
    }

    /// Verify credentials and issue a bearer token
    pub async fn login(&self, req: CredentialsRequest) -> Result<String, AuthError> {
        let creds = validate_credentials(req).map_err(AuthError::Validation)?;

        let user = self
            .store
            .find_by_email(&creds.email)
            .await?
            .ok_or_else(|| {
                warn!("❌ Login attempt for unknown user: {}", creds.email);
                AuthError::UserNotFound
            })?;

        let hasher = self.hasher;
        let password = creds.password;
        let stored_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verify task failed: {e}")))?;

        if !valid {
            warn!("❌ Failed login attempt: {}", user.email);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt_handler.generate_token(&user)?;

        info!("✅ Login successful: {} ({})", user.email, user.id);
        Ok(token)
    }

    /// Decode the identity carried by a bearer token
    pub fn whoami(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.jwt_handler.validate_token(token)?)
    }
}
