//! Managed backend clients (relational data API + auth provider).
//!
//! # Architecture
//!
//! - The backend is the source of truth - NO local persistence, direct API calls
//! - Row-level security is enforced by the backend; every call carries either
//!   the signed-in user's access token or the public anon key
//! - Two object-safe traits form the seam to the rest of the crate:
//!   [`DataApi`] (table operations) and [`AuthApi`] (email/password auth)
//!
//! # Implementations
//!
//! - [`RestBackend`] - `reqwest` client for the PostgREST-style data API and
//!   the GoTrue-style auth API
//! - `MemoryBackend` - in-process tables used by tests (feature `test-util`)
//!
//! # Example
//!
//! ```rust,ignore
//! use golzar_storefront::backend::{DataApi, Query, Table};
//!
//! let products = backend
//!     .select(None, Table::Products, &Query::new().eq("is_available", true).order_desc("created_at"))
//!     .await?;
//! ```

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod query;
mod rest;
pub mod types;

pub use query::{Filter, Query, SortOrder};
pub use rest::RestBackend;
pub use types::{AuthTokens, AuthUser, SignUpOutcome};

use async_trait::async_trait;
use golzar_core::Email;
use secrecy::SecretString;
use serde_json::Value;
use thiserror::Error;

/// Tables exposed by the managed backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Stores,
    Products,
    ProductFeatures,
    Addresses,
    Orders,
    OrderItems,
    CartItems,
    Profiles,
    UserRoles,
    Notifications,
}

impl Table {
    /// All tables, in schema order.
    pub const ALL: [Self; 10] = [
        Self::Stores,
        Self::Products,
        Self::ProductFeatures,
        Self::Addresses,
        Self::Orders,
        Self::OrderItems,
        Self::CartItems,
        Self::Profiles,
        Self::UserRoles,
        Self::Notifications,
    ];

    /// Table name as used in API paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stores => "stores",
            Self::Products => "products",
            Self::ProductFeatures => "product_features",
            Self::Addresses => "addresses",
            Self::Orders => "orders",
            Self::OrderItems => "order_items",
            Self::CartItems => "cart_items",
            Self::Profiles => "profiles",
            Self::UserRoles => "user_roles",
            Self::Notifications => "notifications",
        }
    }

    /// Look up a table by its API name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when talking to the managed backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The caller's token is missing, expired or lacks permission.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unique or foreign-key constraint violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was well-formed but the backend could not serve it.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Build an error from a non-success status and its extracted message.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            503 => Self::Unavailable(message),
            _ => Self::Api { status, message },
        }
    }
}

/// Table operations of the relational data API.
///
/// `bearer` is the signed-in user's access token; `None` means the request is
/// made with the anon key only.
#[async_trait]
pub trait DataApi: Send + Sync {
    /// Select rows matching `query`.
    async fn select(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError>;

    /// Exact number of rows matching `query` (select, order and limit ignored).
    async fn count(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<u64, BackendError>;

    /// Insert rows and return them as stored.
    async fn insert(
        &self,
        bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError>;

    /// Insert rows, merging into existing rows that collide on `on_conflict`.
    async fn upsert(
        &self,
        bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
        on_conflict: &[&str],
    ) -> Result<Vec<Value>, BackendError>;

    /// Apply `patch` to every row matching `query` and return the updated rows.
    async fn update(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;

    /// Delete every row matching `query` and return the deleted rows.
    async fn delete(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError>;
}

/// Email/password operations of the auth provider.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Register a new account; `full_name` is stored as user metadata.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &str,
    ) -> Result<SignUpOutcome, BackendError>;

    /// Exchange email and password for a session.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthTokens, BackendError>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    /// Resolve the user behind `access_token`.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;
}

/// Pull a human-readable message out of a backend error body.
///
/// The data API uses `message`, the auth API uses `msg` or
/// `error_description`; anything else falls back to the raw text.
pub(crate) fn extract_error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_round_trip() {
        for table in Table::ALL {
            assert_eq!(Table::from_name(table.as_str()), Some(table));
        }
        assert_eq!(Table::from_name("users"), None);
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            BackendError::from_status(401, "jwt expired".into()),
            BackendError::Unauthorized(_)
        ));
        assert!(matches!(
            BackendError::from_status(409, "duplicate key".into()),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            BackendError::from_status(400, "bad filter".into()),
            BackendError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(
            extract_error_message(r#"{"code":400,"msg":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(
            extract_error_message(r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#),
            "Email not confirmed"
        );
        assert_eq!(extract_error_message("upstream timeout"), "upstream timeout");
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Api {
            status: 400,
            message: "bad filter".into(),
        };
        assert_eq!(err.to_string(), "API error: 400 - bad filter");
    }
}
