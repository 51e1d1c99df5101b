//! Authentication Module
//! Mission: Credential registration, bearer-token issuance and request gating

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod user_store;
pub mod validation;

pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use password::PasswordHasher;
pub use service::{AuthError, AuthService};
pub use user_store::{CredentialStore, MemoryUserStore, UserStore};
