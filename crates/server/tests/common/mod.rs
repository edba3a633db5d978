//! Common test utilities for in-process API testing.
//!
//! Builds the real router over a SQLite store in a temporary directory and
//! drives it with `tower::ServiceExt::oneshot`, so no port is bound.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use nox_tickets_core::{
    Config, DatabaseConfig, PaginationConfig, ServerConfig, SqliteTicketStore, TicketStore,
};
use nox_tickets_server::{api::create_router, state::AppState};

/// In-process server over a throwaway database.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<dyn TicketStore>,
    /// Keeps the database directory alive for the fixture's lifetime.
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_pagination(PaginationConfig::default())
    }

    pub fn with_pagination(pagination: PaginationConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 8080,
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            pagination,
        };

        let store: Arc<dyn TicketStore> =
            Arc::new(SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"));
        let state = Arc::new(AppState::new(config, Arc::clone(&store)));

        Self {
            router: create_router(state),
            store,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with a raw body (for malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch the raw text of a GET response (for non-JSON endpoints).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
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
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Create a ticket with sensible defaults merged with `overrides`.
    pub async fn create_ticket(&self, overrides: Value) -> TestResponse {
        let mut body = json!({
            "titulo": "Saque não processado",
            "descricao": "Cliente solicitou saque há 3 dias",
            "categoria": "financeiro",
            "subcategoria": "solicitacao_de_saque",
            "aberto_por": "user-1",
        });
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        self.post("/api/v1/tickets", body).await
    }

    /// Create a ticket and return its id.
    pub async fn create_ticket_id(&self, overrides: Value) -> String {
        let response = self.create_ticket(overrides).await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"]
            .as_str()
            .expect("ticket id")
            .to_string()
    }
}
