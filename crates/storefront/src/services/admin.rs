//! Admin dashboard.

use serde::Serialize;
use tracing::instrument;

use golzar_core::StoreId;

use crate::backend::DataApi;
use crate::db::{CatalogRepository, DataScope, OrderRepository, ProfileRepository, RepositoryError};
use crate::models::order::AdminOrder;
use crate::models::{CurrentUser, ProfileWithRoles, Store, StoreWithOwner};

/// Rows shown in the recent orders and recent users lists.
pub const RECENT_LIMIT: usize = 20;

/// Platform-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub users: u64,
    pub stores: u64,
    pub products: u64,
    pub orders: u64,
}

/// Everything on the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub stores: Vec<StoreWithOwner>,
    pub recent_orders: Vec<AdminOrder>,
    pub recent_users: Vec<ProfileWithRoles>,
}

/// Admin operations. Callers must have checked the admin role; the backend
/// enforces it again through row-level security.
pub struct AdminService<'a> {
    scope: DataScope<'a>,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataApi, admin: &'a CurrentUser) -> Self {
        Self {
            scope: DataScope::authenticated(api, admin.access_token.as_str()),
        }
    }

    /// Exact row counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a count fails.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<DashboardStats, RepositoryError> {
        let catalog = CatalogRepository::new(self.scope);
        Ok(DashboardStats {
            users: ProfileRepository::new(self.scope).count().await?,
            stores: catalog.count_stores().await?,
            products: catalog.count_products().await?,
            orders: OrderRepository::new(self.scope).count().await?,
        })
    }

    /// Stats, every store with its owner, and the most recent orders and users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a backend call fails.
    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, RepositoryError> {
        Ok(Dashboard {
            stats: self.stats().await?,
            stores: CatalogRepository::new(self.scope).stores_with_owner().await?,
            recent_orders: OrderRepository::new(self.scope).recent(RECENT_LIMIT).await?,
            recent_users: ProfileRepository::new(self.scope)
                .recent_with_roles(RECENT_LIMIT)
                .await?,
        })
    }

    /// Flip a store between active and inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    #[instrument(skip(self))]
    pub async fn toggle_store(&self, id: StoreId) -> Result<Store, RepositoryError> {
        let catalog = CatalogRepository::new(self.scope);
        let current = catalog.store(id).await?.ok_or(RepositoryError::NotFound)?;
        let updated = catalog.set_store_active(id, !current.is_active).await?;
        tracing::info!(store_id = %id, is_active = updated.is_active, "Store toggled");
        Ok(updated)
    }
}
