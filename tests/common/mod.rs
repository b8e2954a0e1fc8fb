//! Shared helpers for the HTTP API tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};

use tally::web::middleware::RateLimitState;
use tally::{create_router, AppState, AuthService, Config, Database, MemoryNotifier};

pub const PASSWORD: &str = "password123";

/// A router over an in-memory database, with captured notifications.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub notifier: Arc<MemoryNotifier>,
}

/// Configuration with cheap hashing and a generous rate limit.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.jwt.secret = "test-secret-key-for-testing-only".to_string();
    config.argon2.memory_kib = 1024;
    config.argon2.iterations = 1;
    config.argon2.parallelism = 1;
    config.rate_limit.auth_per_second = 1000;
    config.rate_limit.auth_burst = 1000;
    config
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_config()).await
}

pub async fn create_test_app_with(config: Config) -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let notifier = Arc::new(MemoryNotifier::new());
    let auth = AuthService::new(db.clone(), &config, notifier.clone())
        .expect("Failed to create auth service");
    let state = Arc::new(AppState::new(
        db.clone(),
        auth,
        RateLimitState::from_config(&config.rate_limit),
    ));

    let router = create_router(state, &config.server.cors_origins);
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        db,
        notifier,
    }
}

impl TestApp {
    /// Register a tenant; returns the response body.
    pub async fn register(&self, tenant: &str, email: &str) -> Value {
        let response = self
            .server
            .post("/api/v1/auth/register")
            .json(&json!({
                "tenant_name": tenant,
                "email": email,
                "password": PASSWORD,
                "first_name": "Test",
                "last_name": "Owner",
                "store_name": "Main Store"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()
    }

    /// Register a tenant and return its administrator's access token.
    pub async fn admin_token(&self, tenant: &str, email: &str) -> String {
        access_token(&self.register(tenant, email).await)
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .await
    }

    pub async fn get(&self, path: &str, token: &str) -> TestResponse {
        self.server
            .get(path)
            .add_header(AUTHORIZATION, format!("Bearer {}", token))
            .await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.server
            .post(path)
            .add_header(AUTHORIZATION, format!("Bearer {}", token))
            .json(&body)
            .await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.server
            .put(path)
            .add_header(AUTHORIZATION, format!("Bearer {}", token))
            .json(&body)
            .await
    }

    pub async fn delete(&self, path: &str, token: &str) -> TestResponse {
        self.server
            .delete(path)
            .add_header(AUTHORIZATION, format!("Bearer {}", token))
            .await
    }
}

pub fn access_token(body: &Value) -> String {
    body["tokens"]["access_token"]
        .as_str()
        .expect("No access token")
        .to_string()
}

pub fn refresh_token(body: &Value) -> String {
    body["tokens"]["refresh_token"]
        .as_str()
        .expect("No refresh token")
        .to_string()
}
