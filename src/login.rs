//! Login gate and the in-memory session flag.
//!
//! The gate is a domain allow-list, not authentication: the password is never
//! checked and nothing is persisted.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{info, warn};

pub const ALLOWED_EMAIL_SUFFIX: &str = "@gmail.com";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("Email must be a valid @gmail.com address")]
    InvalidEmailDomain,
}

/// Succeeds iff `email` ends with [`ALLOWED_EMAIL_SUFFIX`] (case-sensitive).
/// Callers must reject empty fields before getting here.
pub fn attempt_login(email: &str, _password: &str) -> Result<(), LoginError> {
    if email.ends_with(ALLOWED_EMAIL_SUFFIX) {
        info!("Login accepted for {}", email);
        Ok(())
    } else {
        warn!("Login rejected for {}", email);
        Err(LoginError::InvalidEmailDomain)
    }
}

/// Process-wide authenticated flag. Starts false; there is no logout.
#[derive(Debug, Default)]
pub struct Session {
    authenticated: AtomicBool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn authenticate(&self) {
        self.authenticated.store(true, Ordering::Release);
    }
}
