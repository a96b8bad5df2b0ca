//! Seller dashboard: the seller's own store, its products and features, and
//! the orders it receives.
//!
//! Every operation resolves the seller's store from `stores.owner_id` first,
//! so a seller can only ever touch rows of their own store.

use thiserror::Error;
use tracing::instrument;

use golzar_core::{NotificationKind, OrderId, OrderStatus, ProductFeatureId, ProductId, UserId};

use crate::backend::DataApi;
use crate::db::{CatalogRepository, DataScope, NotificationRepository, OrderRepository, RepositoryError};
use crate::models::notification::NewNotification;
use crate::models::{CurrentUser, Order, Product, ProductFeature, Store, StoreOrder};
use crate::validation::{ValidFeature, ValidProduct, ValidStore};

/// Notification title shown to customers on status changes.
const STATUS_CHANGE_TITLE: &str = "تغییر وضعیت سفارش";

/// Errors that can occur in seller operations.
#[derive(Debug, Error)]
pub enum SellerError {
    /// The seller has not created a store yet.
    #[error("seller has no store")]
    NoStore,

    /// The seller already has a store.
    #[error("seller already has a store")]
    StoreExists,

    /// The product, feature or order is not in the seller's store.
    #[error("not found in seller's store")]
    NotFound,

    /// Backend call failed.
    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for SellerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Operations on the signed-in seller's store.
pub struct SellerService<'a> {
    scope: DataScope<'a>,
    owner: UserId,
}

impl<'a> SellerService<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataApi, user: &'a CurrentUser) -> Self {
        Self {
            scope: DataScope::authenticated(api, user.access_token.as_str()),
            owner: user.id,
        }
    }

    fn catalog(&self) -> CatalogRepository<'a> {
        CatalogRepository::new(self.scope)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store
    // ─────────────────────────────────────────────────────────────────────────

    /// The seller's store, if created.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::Repository` if the backend call fails.
    pub async fn store(&self) -> Result<Option<Store>, SellerError> {
        Ok(self.catalog().store_of_owner(self.owner).await?)
    }

    async fn own_store(&self) -> Result<Store, SellerError> {
        self.store().await?.ok_or(SellerError::NoStore)
    }

    /// Create the seller's store.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::StoreExists` if the seller already has one.
    #[instrument(skip(self, store), fields(owner_id = %self.owner))]
    pub async fn create_store(&self, store: &ValidStore) -> Result<Store, SellerError> {
        if self.store().await?.is_some() {
            return Err(SellerError::StoreExists);
        }
        let created = self
            .catalog()
            .create_store(self.owner, store)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => SellerError::StoreExists,
                other => other.into(),
            })?;
        tracing::info!(store_id = %created.id, "Store created");
        Ok(created)
    }

    /// Update the seller's store.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NoStore` if the seller has no store.
    #[instrument(skip(self, store), fields(owner_id = %self.owner))]
    pub async fn update_store(&self, store: &ValidStore) -> Result<Store, SellerError> {
        let current = self.own_store().await?;
        Ok(self.catalog().update_store(self.owner, current.id, store).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Products
    // ─────────────────────────────────────────────────────────────────────────

    /// Every product of the store, including unavailable ones.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NoStore` if the seller has no store.
    pub async fn products(&self) -> Result<Vec<Product>, SellerError> {
        let store = self.own_store().await?;
        Ok(self.catalog().products_of_store(store.id, false).await?)
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NoStore` if the seller has no store.
    #[instrument(skip(self, product), fields(owner_id = %self.owner))]
    pub async fn create_product(&self, product: &ValidProduct) -> Result<Product, SellerError> {
        let store = self.own_store().await?;
        Ok(self.catalog().create_product(store.id, product).await?)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NotFound` if the product is not in the store.
    #[instrument(skip(self, product), fields(owner_id = %self.owner))]
    pub async fn update_product(&self, id: ProductId, product: &ValidProduct) -> Result<Product, SellerError> {
        let store = self.own_store().await?;
        Ok(self.catalog().update_product(store.id, id, product).await?)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NotFound` if the product is not in the store.
    #[instrument(skip(self), fields(owner_id = %self.owner))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), SellerError> {
        let store = self.own_store().await?;
        Ok(self.catalog().delete_product(store.id, id).await?)
    }

    async fn own_product(&self, id: ProductId) -> Result<Product, SellerError> {
        let store = self.own_store().await?;
        self.catalog()
            .product_of_store(store.id, id)
            .await?
            .ok_or(SellerError::NotFound)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Features
    // ─────────────────────────────────────────────────────────────────────────

    /// Features of one of the store's products.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NotFound` if the product is not in the store.
    pub async fn features(&self, product: ProductId) -> Result<Vec<ProductFeature>, SellerError> {
        let product = self.own_product(product).await?;
        Ok(self.catalog().features(product.id).await?)
    }

    /// Save a product's features: entries with an ID update that feature,
    /// entries without one are inserted. Returns the full feature list.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NotFound` if the product is not in the store or
    /// an ID names a feature of another product.
    #[instrument(skip(self, features), fields(count = features.len()))]
    pub async fn save_features(
        &self,
        product: ProductId,
        features: &[ValidFeature],
    ) -> Result<Vec<ProductFeature>, SellerError> {
        let product = self.own_product(product).await?;
        let catalog = self.catalog();

        let mut new = Vec::new();
        for feature in features {
            match feature.id {
                Some(id) => {
                    catalog.update_feature(product.id, id, feature).await?;
                }
                None => new.push(feature),
            }
        }
        catalog.insert_features(product.id, &new).await?;

        Ok(catalog.features(product.id).await?)
    }

    /// Delete a feature of one of the store's products.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NotFound` if the feature is not on a product of
    /// the store.
    #[instrument(skip(self), fields(owner_id = %self.owner))]
    pub async fn delete_feature(&self, id: ProductFeatureId) -> Result<(), SellerError> {
        let feature = self.catalog().feature(id).await?.ok_or(SellerError::NotFound)?;
        self.own_product(feature.product_id).await?;
        Ok(self.catalog().delete_feature(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// Orders received by the store, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NoStore` if the seller has no store.
    pub async fn orders(&self) -> Result<Vec<StoreOrder>, SellerError> {
        let store = self.own_store().await?;
        Ok(OrderRepository::new(self.scope).for_store(store.id).await?)
    }

    /// Move an order to `status` and tell the customer.
    ///
    /// The notification is sent after the status is saved; if it fails the
    /// status change still stands.
    ///
    /// # Errors
    ///
    /// Returns `SellerError::NotFound` if the order is not in the store.
    #[instrument(skip(self), fields(owner_id = %self.owner))]
    pub async fn change_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, SellerError> {
        let store = self.own_store().await?;
        let order = OrderRepository::new(self.scope)
            .update_status(store.id, id, status)
            .await?;

        let notification = NewNotification {
            user_id: order.customer_id,
            title: STATUS_CHANGE_TITLE.to_string(),
            message: status.customer_message().to_string(),
            kind: NotificationKind::OrderStatus,
            related_order_id: Some(order.id),
        };
        if let Err(e) = NotificationRepository::new(self.scope).insert(&notification).await {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to notify customer of status change");
        }

        tracing::info!(order_id = %order.id, status = status.as_str(), "Order status changed");
        Ok(order)
    }
}
