//! Input validation for register/login bodies.

use crate::auth::models::CredentialsRequest;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Local part may not end with a dot; each domain label starts alphanumeric.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

/// Field name -> messages, serialized as `{"errors": {field: [msg]}}`
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Credentials that passed shape validation
#[derive(Debug, Clone)]
pub struct ValidCredentials {
    pub email: String,
    pub password: String,
}

/// No leading dot and no `..` anywhere; the regex crate has no lookahead for these.
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_REGEX.is_match(email)
}

/// Check both fields and collect every problem rather than stopping at the first.
pub fn validate_credentials(req: CredentialsRequest) -> Result<ValidCredentials, FieldErrors> {
    let mut errors = FieldErrors::new();

    match req.email.as_deref() {
        None => push(&mut errors, "email", "Required"),
        Some(email) if !is_valid_email(email) => push(&mut errors, "email", "Invalid email"),
        Some(_) => {}
    }

    match req.password.as_deref() {
        None => push(&mut errors, "password", "Required"),
        Some(password) if password.chars().count() < MIN_PASSWORD_LENGTH => push(
            &mut errors,
            "password",
            &format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ),
        Some(_) => {}
    }

    match (req.email, req.password) {
        (Some(email), Some(password)) if errors.is_empty() => {
            Ok(ValidCredentials { email, password })
        }
        _ => Err(errors),
    }
}

fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}
