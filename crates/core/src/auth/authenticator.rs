use async_trait::async_trait;
use thiserror::Error;

use super::request::{AuthRequest, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Admin credentials required")]
    NotAuthenticated,

    #[error("Invalid admin credentials: {0}")]
    InvalidCredentials(String),

    #[error("Authentication misconfigured: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::ConfigurationError(_) => "internal_error",
        }
    }
}

/// Decides whether a request may use the admin surface.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method, as written in config.
    fn method_name(&self) -> &'static str;

    /// `false` lets callers skip building an [`AuthRequest`] at all.
    fn requires_credentials(&self) -> bool {
        true
    }
}

/// Treats every request as an anonymous admin.
///
/// Only selected by an explicit `method = "none"`.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }

    fn requires_credentials(&self) -> bool {
        false
    }
}
