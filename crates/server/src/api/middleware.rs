//! Admin authentication and request metrics middleware.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use walkin_core::{AuthError, AuthRequest, Identity};

use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Record duration, count and in-flight gauge for every request.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let response = next.run(request).await;
    HTTP_REQUESTS_IN_FLIGHT.dec();

    let status = response.status().as_u16().to_string();
    let labels = [method.as_str(), path.as_str(), status.as_str()];

    HTTP_REQUEST_DURATION
        .with_label_values(&labels)
        .observe(start.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();

    response
}

/// Build the authenticator's view of a request.
fn auth_request_from(request: &Request<Body>) -> AuthRequest {
    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let headers = request
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));

    AuthRequest::from_headers(headers, source_ip)
}

/// Gate admin routes behind the configured authenticator.
///
/// On success the resolved [`Identity`] is stored in the request extensions.
/// Missing or wrong credentials yield `401`; authenticator failures `500`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let authenticator = state.authenticator();

    if !authenticator.requires_credentials() {
        request.extensions_mut().insert(Identity::anonymous());
        return Ok(next.run(request).await);
    }

    let auth_request = auth_request_from(&request);

    let error = match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            return Ok(next.run(request).await);
        }
        Err(e) => e,
    };

    AUTH_FAILURES_TOTAL
        .with_label_values(&[error.reason()])
        .inc();

    match error {
        AuthError::NotAuthenticated => {
            debug!("Admin request without credentials");
            Err(StatusCode::UNAUTHORIZED)
        }
        AuthError::InvalidCredentials(reason) => {
            warn!(
                "Rejected admin credentials from {}: {}",
                auth_request.source_ip, reason
            );
            Err(StatusCode::UNAUTHORIZED)
        }
        e @ AuthError::ConfigurationError(_) => {
            warn!("Authentication error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
