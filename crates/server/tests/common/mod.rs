//! Common test utilities for in-process API testing.
//!
//! The fixture builds the full router over an in-memory store double, so
//! tests can flip store failures and drive scheduled removals directly.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use walkin_core::{
    create_authenticator, testing::MockTicketStore, AuthConfig, AuthMethod, Authenticator,
    Config, DatabaseConfig, QueueConfig, QueueService, RemovalScheduler, ServerConfig,
    TicketStore,
};
use walkin_server::api::{create_router, WsBroadcaster};
use walkin_server::state::AppState;

/// Test fixture running the API in-process.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_issue() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/tickets", json!({ "email": "a@x.com" })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Store double - toggle read/write failures
    pub store: Arc<MockTicketStore>,
    /// Removal worker, driven manually with `elapse_removal_delay`
    pub scheduler: RemovalScheduler,
    /// Key sent on admin requests, if any
    api_key: Option<String>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Require this admin API key (auth method `none` when unset)
    pub api_key: Option<String>,
}

impl TestConfig {
    pub fn with_api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
        }
    }
}

impl TestFixture {
    /// Create a fixture with auth disabled.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let auth = match &test_config.api_key {
            Some(key) => AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(key.clone()),
            },
            None => AuthConfig {
                method: AuthMethod::None,
                api_key: None,
            },
        };

        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
        };

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );

        let store = Arc::new(MockTicketStore::new());
        let ticket_store = Arc::clone(&store) as Arc<dyn TicketStore>;
        let queue = QueueService::new(Arc::clone(&ticket_store), &config.queue);
        let scheduler = RemovalScheduler::new(ticket_store, &config.queue);

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            queue,
            WsBroadcaster::default(),
        ));

        Self {
            router: create_router(state),
            store,
            scheduler,
            api_key: test_config.api_key,
        }
    }

    /// Run the removal worker as if the removal delay had elapsed.
    pub fn elapse_removal_delay(&self) -> usize {
        self.scheduler
            .process_due(Utc::now() + chrono::Duration::seconds(60))
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, self.api_key.as_deref()).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), self.api_key.as_deref())
            .await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, self.api_key.as_deref()).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, self.api_key.as_deref())
            .await
    }

    /// Send a request with an explicit API key (or none), ignoring the fixture's.
    pub async fn request_with_key(
        &self,
        method: &str,
        path: &str,
        api_key: Option<&str>,
    ) -> TestResponse {
        self.request(method, path, None, api_key).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        api_key: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        if let Some(key) = api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", key));
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
