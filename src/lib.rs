//! Keygate - credential authentication service
//!
//! Registers users with bcrypt-hashed passwords, issues signed JWT bearer
//! tokens on login and gates protected routes on those tokens.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;

pub use config::Config;
