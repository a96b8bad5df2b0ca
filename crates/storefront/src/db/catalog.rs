//! Stores, products and product features.

use serde_json::{Value, json};
use tracing::instrument;

use golzar_core::{ProductFeatureId, ProductId, StoreId, UserId};

use super::{DataScope, RepositoryError};
use crate::backend::{Query, Table};
use crate::models::{Product, ProductFeature, ProductWithStore, Store, StoreWithOwner};
use crate::validation::{ValidFeature, ValidProduct, ValidStore};

/// Store columns shown on a product page.
const PRODUCT_WITH_STORE: &str = "*,stores(id,name,description,logo_url)";

/// Repository for the catalog tables.
pub struct CatalogRepository<'a> {
    scope: DataScope<'a>,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(scope: DataScope<'a>) -> Self {
        Self { scope }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stores
    // ─────────────────────────────────────────────────────────────────────────

    /// Active stores ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn active_stores(&self) -> Result<Vec<Store>, RepositoryError> {
        self.scope
            .select(
                Table::Stores,
                &Query::new().eq("is_active", true).order_asc("name"),
            )
            .await
    }

    /// An active store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn active_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        self.scope
            .select_one(
                Table::Stores,
                Query::new().eq("id", id).eq("is_active", true),
            )
            .await
    }

    /// A store by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    pub async fn store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        self.scope
            .select_one(Table::Stores, Query::new().eq("id", id))
            .await
    }

    /// The store owned by a seller, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn store_of_owner(&self, owner: UserId) -> Result<Option<Store>, RepositoryError> {
        self.scope
            .select_one(Table::Stores, Query::new().eq("owner_id", owner))
            .await
    }

    /// Create a store for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has a store.
    #[instrument(skip(self, store))]
    pub async fn create_store(&self, owner: UserId, store: &ValidStore) -> Result<Store, RepositoryError> {
        let mut row = store_row(store);
        row["owner_id"] = json!(owner);
        self.scope.insert_one(Table::Stores, row).await
    }

    /// Update a store owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not belong to the owner.
    #[instrument(skip(self, store))]
    pub async fn update_store(
        &self,
        owner: UserId,
        id: StoreId,
        store: &ValidStore,
    ) -> Result<Store, RepositoryError> {
        self.scope
            .update_one(
                Table::Stores,
                &Query::new().eq("id", id).eq("owner_id", owner),
                store_row(store),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// All stores with their owners' names, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn stores_with_owner(&self) -> Result<Vec<StoreWithOwner>, RepositoryError> {
        self.scope
            .select(
                Table::Stores,
                &Query::new()
                    .select("*,profiles!stores_owner_id_fkey(full_name)")
                    .order_desc("created_at"),
            )
            .await
    }

    /// Activate or deactivate a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such store is visible.
    #[instrument(skip(self))]
    pub async fn set_store_active(&self, id: StoreId, active: bool) -> Result<Store, RepositoryError> {
        self.scope
            .update_one(
                Table::Stores,
                &Query::new().eq("id", id),
                json!({ "is_active": active }),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Number of stores.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn count_stores(&self) -> Result<u64, RepositoryError> {
        self.scope.count(Table::Stores, &Query::new()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Products
    // ─────────────────────────────────────────────────────────────────────────

    /// Available, in-stock products newest first, optionally narrowed to one
    /// store and a name search.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn available_products(
        &self,
        store: Option<StoreId>,
        search: Option<&str>,
    ) -> Result<Vec<ProductWithStore>, RepositoryError> {
        let mut query = Query::new()
            .select("*,stores(name)")
            .eq("is_available", true)
            .gt("stock", 0);
        if let Some(store) = store {
            query = query.eq("store_id", store);
        }
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.contains("name", search);
        }
        self.scope
            .select(Table::Products, &query.order_desc("created_at"))
            .await
    }

    /// An available product with its store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn available_product(&self, id: ProductId) -> Result<Option<ProductWithStore>, RepositoryError> {
        self.scope
            .select_one(
                Table::Products,
                Query::new()
                    .select(PRODUCT_WITH_STORE)
                    .eq("id", id)
                    .eq("is_available", true),
            )
            .await
    }

    /// Set a product's stock to `to` only while it still holds `from`.
    ///
    /// Returns `None` when the stock moved in between or the product is gone,
    /// in which case nothing was written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self))]
    pub async fn swap_stock(
        &self,
        id: ProductId,
        from: u32,
        to: u32,
    ) -> Result<Option<Product>, RepositoryError> {
        self.scope
            .update_one(
                Table::Products,
                &Query::new().eq("id", id).eq("stock", from),
                json!({ "stock": to }),
            )
            .await
    }

    /// Products of a store, newest first. `available_only` hides unavailable
    /// and sold-out products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn products_of_store(
        &self,
        store: StoreId,
        available_only: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut query = Query::new().eq("store_id", store);
        if available_only {
            query = query.eq("is_available", true).gt("stock", 0);
        }
        self.scope
            .select(Table::Products, &query.order_desc("created_at"))
            .await
    }

    /// A product of `store`, regardless of availability.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn product_of_store(
        &self,
        store: StoreId,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        self.scope
            .select_one(
                Table::Products,
                Query::new().eq("id", id).eq("store_id", store),
            )
            .await
    }

    /// Create a product in `store`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, product))]
    pub async fn create_product(
        &self,
        store: StoreId,
        product: &ValidProduct,
    ) -> Result<Product, RepositoryError> {
        let mut row = product_row(product);
        row["store_id"] = json!(store);
        self.scope.insert_one(Table::Products, row).await
    }

    /// Update a product of `store`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store.
    #[instrument(skip(self, product))]
    pub async fn update_product(
        &self,
        store: StoreId,
        id: ProductId,
        product: &ValidProduct,
    ) -> Result<Product, RepositoryError> {
        self.scope
            .update_one(
                Table::Products,
                &Query::new().eq("id", id).eq("store_id", store),
                product_row(product),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product of `store`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, store: StoreId, id: ProductId) -> Result<(), RepositoryError> {
        let removed = self
            .scope
            .delete(
                Table::Products,
                &Query::new().eq("id", id).eq("store_id", store),
            )
            .await?;
        if removed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn count_products(&self) -> Result<u64, RepositoryError> {
        self.scope.count(Table::Products, &Query::new()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Features
    // ─────────────────────────────────────────────────────────────────────────

    /// Features of a product in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn features(&self, product: ProductId) -> Result<Vec<ProductFeature>, RepositoryError> {
        self.scope
            .select(
                Table::ProductFeatures,
                &Query::new().eq("product_id", product).order_asc("created_at"),
            )
            .await
    }

    /// Insert new features for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, features), fields(count = features.len()))]
    pub async fn insert_features(
        &self,
        product: ProductId,
        features: &[&ValidFeature],
    ) -> Result<Vec<ProductFeature>, RepositoryError> {
        if features.is_empty() {
            return Ok(Vec::new());
        }
        let rows = features
            .iter()
            .map(|f| {
                json!({
                    "product_id": product,
                    "feature_name": f.name,
                    "feature_value": f.value,
                })
            })
            .collect();
        self.scope.insert(Table::ProductFeatures, rows).await
    }

    /// Rename or revalue an existing feature of `product`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the feature is not on the product.
    #[instrument(skip(self, feature))]
    pub async fn update_feature(
        &self,
        product: ProductId,
        id: ProductFeatureId,
        feature: &ValidFeature,
    ) -> Result<ProductFeature, RepositoryError> {
        self.scope
            .update_one(
                Table::ProductFeatures,
                &Query::new().eq("id", id).eq("product_id", product),
                json!({
                    "feature_name": feature.name,
                    "feature_value": feature.value,
                }),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// A feature by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    pub async fn feature(&self, id: ProductFeatureId) -> Result<Option<ProductFeature>, RepositoryError> {
        self.scope
            .select_one(Table::ProductFeatures, Query::new().eq("id", id))
            .await
    }

    /// Delete a feature.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self))]
    pub async fn delete_feature(&self, id: ProductFeatureId) -> Result<(), RepositoryError> {
        self.scope
            .delete(Table::ProductFeatures, &Query::new().eq("id", id))
            .await?;
        Ok(())
    }
}

fn store_row(store: &ValidStore) -> Value {
    json!({
        "name": store.name,
        "description": store.description,
        "phone": store.phone.as_ref().map(|p| p.as_str()),
        "address": store.address,
        "logo_url": store.logo_url,
    })
}

fn product_row(product: &ValidProduct) -> Value {
    json!({
        "name": product.name,
        "description": product.description,
        "price": product.price,
        "stock": product.stock,
        "image_url": product.image_url,
        "is_available": product.is_available,
        "category": product.category,
    })
}
