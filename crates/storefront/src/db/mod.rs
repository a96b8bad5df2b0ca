//! Repositories over the managed backend's data API.
//!
//! # Tables
//!
//! - `stores`, `products`, `product_features` - catalog ([`CatalogRepository`])
//! - `addresses` - delivery addresses ([`AddressRepository`])
//! - `orders`, `order_items` - placed orders ([`OrderRepository`])
//! - `cart_items` - signed-in carts ([`CartItemRepository`])
//! - `profiles`, `user_roles` - users and roles ([`ProfileRepository`])
//! - `notifications` - in-app notifications ([`NotificationRepository`])
//!
//! Every repository borrows a [`DataScope`]: the backend plus the bearer
//! token of the user on whose behalf the request is made. Row-level security
//! lives in the backend; repositories still filter by owner so that a
//! misconfigured policy never widens what a page shows.

mod addresses;
mod cart_items;
mod catalog;
mod notifications;
mod orders;
mod profiles;

pub use addresses::AddressRepository;
pub use cart_items::CartItemRepository;
pub use catalog::CatalogRepository;
pub use notifications::NotificationRepository;
pub use orders::{NewOrder, OrderRepository};
pub use profiles::ProfileRepository;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::backend::{BackendError, DataApi, Query, Table};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backend call failed.
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// A row could not be decoded into its model.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found (or is not visible to the caller).
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g. duplicate cart line).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<BackendError> for RepositoryError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict(message) => Self::Conflict(message),
            BackendError::NotFound(_) => Self::NotFound,
            other => Self::Backend(other),
        }
    }
}

/// The backend plus the caller's bearer token.
#[derive(Clone, Copy)]
pub struct DataScope<'a> {
    api: &'a dyn DataApi,
    bearer: Option<&'a str>,
}

impl<'a> DataScope<'a> {
    /// Scope for a signed-in user.
    #[must_use]
    pub const fn authenticated(api: &'a dyn DataApi, bearer: &'a str) -> Self {
        Self {
            api,
            bearer: Some(bearer),
        }
    }

    /// Scope for an anonymous visitor (anon key only).
    #[must_use]
    pub const fn anonymous(api: &'a dyn DataApi) -> Self {
        Self { api, bearer: None }
    }

    /// Select rows and decode them.
    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        query: &Query,
    ) -> Result<Vec<T>, RepositoryError> {
        let rows = self.api.select(self.bearer, table, query).await?;
        decode_rows(table, rows)
    }

    /// Select at most one row.
    pub(crate) async fn select_one<T: DeserializeOwned>(
        &self,
        table: Table,
        query: Query,
    ) -> Result<Option<T>, RepositoryError> {
        let rows = self.select(table, &query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    pub(crate) async fn count(&self, table: Table, query: &Query) -> Result<u64, RepositoryError> {
        Ok(self.api.count(self.bearer, table, query).await?)
    }

    pub(crate) async fn insert<T: DeserializeOwned>(
        &self,
        table: Table,
        rows: Vec<Value>,
    ) -> Result<Vec<T>, RepositoryError> {
        let rows = self.api.insert(self.bearer, table, rows).await?;
        decode_rows(table, rows)
    }

    /// Insert one row and return it as stored.
    pub(crate) async fn insert_one<T: DeserializeOwned>(
        &self,
        table: Table,
        row: Value,
    ) -> Result<T, RepositoryError> {
        self.insert(table, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::DataCorruption(format!("insert into {table} returned no row")))
    }

    pub(crate) async fn upsert_one<T: DeserializeOwned>(
        &self,
        table: Table,
        row: Value,
        on_conflict: &[&str],
    ) -> Result<T, RepositoryError> {
        let rows = self
            .api
            .upsert(self.bearer, table, vec![row], on_conflict)
            .await?;
        decode_rows(table, rows)?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::DataCorruption(format!("upsert into {table} returned no row")))
    }

    pub(crate) async fn update<T: DeserializeOwned>(
        &self,
        table: Table,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<T>, RepositoryError> {
        let rows = self.api.update(self.bearer, table, query, patch).await?;
        decode_rows(table, rows)
    }

    /// Update rows matching `query`; returns the first updated row.
    pub(crate) async fn update_one<T: DeserializeOwned>(
        &self,
        table: Table,
        query: &Query,
        patch: Value,
    ) -> Result<Option<T>, RepositoryError> {
        Ok(self.update(table, query, patch).await?.into_iter().next())
    }

    /// Delete rows matching `query`; returns how many were removed.
    pub(crate) async fn delete(&self, table: Table, query: &Query) -> Result<usize, RepositoryError> {
        Ok(self.api.delete(self.bearer, table, query).await?.len())
    }
}

fn decode_rows<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Result<Vec<T>, RepositoryError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid {table} row: {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::models::Store;

    #[tokio::test]
    async fn test_decode_failure_is_data_corruption() {
        let backend = MemoryBackend::new();
        backend.insert_row(Table::Stores, json!({"name": "بدون مالک"}));

        let scope = DataScope::anonymous(&backend);
        let err = scope
            .select::<Store>(Table::Stores, &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }

    #[test]
    fn test_backend_conflict_maps_to_conflict() {
        let err = RepositoryError::from(BackendError::Conflict("dup".into()));
        assert!(matches!(err, RepositoryError::Conflict(_)));
        let err = RepositoryError::from(BackendError::Unauthorized("jwt".into()));
        assert!(matches!(err, RepositoryError::Backend(_)));
    }
}
