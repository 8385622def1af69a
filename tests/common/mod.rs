//! Common test utilities for E2E tests

#![allow(dead_code)]

use serde_json::{Value, json};
use socnet::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
    _shutdown: watch::Sender<bool>,
}

/// A registered user and their bearer token
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database and avatars
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let avatars_dir = temp_dir.path().join("avatars");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                origin: "http://test.example.com".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path,
                max_connections: 4,
                busy_timeout_seconds: 10,
            },
            auth: config::AuthConfig {
                token_secret: "test-secret-key-that-is-32-bytes-long".to_string(),
                token_ttl_seconds: 3600,
            },
            storage: config::StorageConfig { avatars_dir },
            fanout: config::FanoutConfig {
                poll_interval_ms: 50,
                ..Default::default()
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Fan-out worker runs for the lifetime of the server
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(state.fanout_worker().run(shutdown_rx));

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = socnet::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
            _shutdown: shutdown_tx,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register a user through the API and log them in
    pub async fn register(&self, username: &str) -> TestUser {
        let email = format!("{username}@example.com");

        let response = self
            .client
            .post(self.url("/api/users"))
            .json(&json!({ "email": email, "username": username }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204, "registering {username}");

        let login: Value = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        TestUser {
            id: login["auth_user"]["id"].as_i64().unwrap(),
            username: username.to_string(),
            token: login["token"].as_str().unwrap().to_string(),
        }
    }

    /// GET with an optional bearer token, returning status and JSON body
    pub async fn get_json(&self, path: &str, user: Option<&TestUser>) -> (u16, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(user) = user {
            request = request.bearer_auth(&user.token);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// POST a JSON body as `user`, returning status and JSON body
    pub async fn post_json(&self, path: &str, user: &TestUser, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// POST without a body as `user`
    pub async fn post_empty(&self, path: &str, user: &TestUser) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Publish a post as `user` and return its id
    pub async fn create_post(&self, user: &TestUser, content: &str) -> i64 {
        let (status, body) = self
            .post_json("/api/posts", user, json!({ "content": content }))
            .await;
        assert_eq!(status, 201);
        body["post"]["id"].as_i64().unwrap()
    }

    /// Poll the timeline of `user` until it holds `expected` entries
    pub async fn wait_for_timeline(&self, user: &TestUser, expected: usize) -> Value {
        for _ in 0..100 {
            let (status, body) = self.get_json("/api/timeline", Some(user)).await;
            assert_eq!(status, 200);
            if body.as_array().map(Vec::len) == Some(expected) {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("timeline of {} never reached {expected} entries", user.username);
    }
}
