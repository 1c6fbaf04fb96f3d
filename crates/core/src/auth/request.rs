use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// What an authenticator gets to see of an incoming admin request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    pub fn new(source_ip: IpAddr) -> Self {
        Self {
            headers: HashMap::new(),
            source_ip,
        }
    }

    /// Build from raw header pairs. Names are matched case-insensitively.
    pub fn from_headers<I, K, V>(headers: I, source_ip: IpAddr) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(Self::new(source_ip), |request, (name, value)| {
                request.with_header(name.as_ref(), value)
            })
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Who is operating the front desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    /// Authenticator that produced this identity.
    pub method: String,
}

impl Identity {
    /// Identity used when admin authentication is switched off.
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }

    pub fn admin(method: &str) -> Self {
        Self {
            user_id: "admin".to_string(),
            method: method.to_string(),
        }
    }
}
