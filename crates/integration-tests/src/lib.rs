//! Integration tests for Golzar.
//!
//! The tests drive the complete storefront router (sessions, rate limits,
//! security headers and all) with `tower::ServiceExt::oneshot` over an
//! in-memory backend. No network or database is needed:
//!
//! ```bash
//! cargo test -p golzar-integration-tests
//! ```
//!
//! [`TestApp`] keeps the session cookie between requests the way a browser
//! would, so a test reads as one user's visit.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use golzar_core::{Role, UserId};
use golzar_storefront::backend::Table;
use golzar_storefront::backend::memory::MemoryBackend;
use golzar_storefront::config::StorefrontConfig;
use golzar_storefront::routes;
use golzar_storefront::state::AppState;

/// Password used for every seeded account.
pub const PASSWORD: &str = "secret123";

/// Largest response body the tests read.
const BODY_LIMIT: usize = 1024 * 1024;

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body, `Null` when empty, or the raw text when not JSON.
    pub body: Value,
}

/// One browser session against a fresh application.
pub struct TestApp {
    pub backend: MemoryBackend,
    router: Router,
    cookie: Option<String>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// A new application over an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        let backend = MemoryBackend::new();
        let shared = Arc::new(backend.clone());
        let state = AppState::with_backend(StorefrontConfig::for_tests(), shared.clone(), shared);
        Self {
            backend,
            router: routes::app(state),
            cookie: None,
        }
    }

    /// A second visitor on the same application and backend, with no cookie.
    #[must_use]
    pub fn new_visitor(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            router: self.router.clone(),
            cookie: None,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }

    /// Send a request with the current session cookie and remember any new one.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    #[allow(clippy::unwrap_used)]
    pub async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        {
            self.cookie = Some(set_cookie.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Sign in through the API.
    ///
    /// # Panics
    ///
    /// Panics if the sign-in is rejected.
    pub async fn login(&mut self, email: &str) -> TestResponse {
        let response = self
            .post("/auth/login", json!({"email": email, "password": PASSWORD}))
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {:?}", response.body);
        response
    }

    /// Seed a user holding `roles`.
    pub fn seed_user(&self, email: &str, full_name: &str, roles: &[Role]) -> UserId {
        self.backend.seed_user(email, PASSWORD, full_name, roles)
    }

    /// Seed a seller and their active store. Returns the owner and the store row.
    pub fn seed_store(&self, owner_email: &str, store_name: &str) -> (UserId, Value) {
        let owner = self.seed_user(owner_email, "فروشنده", &[Role::Customer, Role::Seller]);
        let store = self
            .backend
            .insert_row(Table::Stores, json!({"name": store_name, "owner_id": owner}));
        (owner, store)
    }

    /// Seed an available product. Returns the product row.
    pub fn seed_product(&self, store: &Value, name: &str, price: &str, stock: u32) -> Value {
        self.backend.insert_row(
            Table::Products,
            json!({
                "name": name,
                "price": price,
                "stock": stock,
                "store_id": store["id"],
            }),
        )
    }

    /// Seed an address for `user`. Returns the address row.
    pub fn seed_address(&self, user: UserId) -> Value {
        self.backend.insert_row(
            Table::Addresses,
            json!({
                "user_id": user,
                "title": "خانه",
                "full_address": "تهران، خیابان ولیعصر، پلاک ۱۲",
                "phone": "09123456789",
                "is_default": true,
            }),
        )
    }
}
