//! Admin authentication.
//!
//! Visitors never authenticate; only the queue management surface does.

mod api_key;
mod authenticator;
mod request;

pub use api_key::ApiKeyAuthenticator;
pub use authenticator::{AuthError, Authenticator, NoneAuthenticator};
pub use request::{AuthRequest, Identity};

use crate::config::{AuthConfig, AuthMethod};

/// Build the authenticator selected by `[auth]`.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match (&config.method, config.api_key.as_deref()) {
        (AuthMethod::None, _) => Ok(Box::new(NoneAuthenticator::new())),
        (AuthMethod::ApiKey, Some(key)) if !key.is_empty() => {
            Ok(Box::new(ApiKeyAuthenticator::new(key.to_string())))
        }
        (AuthMethod::ApiKey, _) => Err(AuthError::ConfigurationError(
            "auth.api_key must be set when method = \"api_key\"".to_string(),
        )),
    }
}
