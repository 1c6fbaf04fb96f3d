//! Shared-key authentication for the front desk.

use async_trait::async_trait;
use tracing::debug;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Header a key was presented in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySource {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `X-API-Key: <key>`
    ApiKeyHeader,
}

/// Admits requests carrying the configured admin key.
pub struct ApiKeyAuthenticator {
    admin_key: Vec<u8>,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: String) -> Self {
        Self {
            admin_key: api_key.into_bytes(),
        }
    }
}

/// A bearer token wins over `X-API-Key`; non-bearer `Authorization` values are ignored.
fn presented_key(request: &AuthRequest) -> Option<(&str, KeySource)> {
    let bearer = request.header("authorization").and_then(|value| {
        let (scheme, token) = value.split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
    });

    match bearer {
        Some(token) => Some((token, KeySource::Bearer)),
        None => request
            .header("x-api-key")
            .map(|key| (key.trim(), KeySource::ApiKeyHeader)),
    }
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let (key, source) = presented_key(request).ok_or(AuthError::NotAuthenticated)?;

        if !keys_match(key.as_bytes(), &self.admin_key) {
            return Err(AuthError::InvalidCredentials(format!(
                "admin key rejected ({:?})",
                source
            )));
        }

        debug!("Admin authenticated via {:?}", source);
        Ok(Identity::admin(self.method_name()))
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}
