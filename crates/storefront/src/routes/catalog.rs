//! Public catalog: active stores and available products.
//!
//! Reads run with the anonymous key; row-level security hides inactive
//! stores and unavailable products from it anyway.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use golzar_core::{ProductId, StoreId};

use crate::db::{CatalogRepository, DataScope};
use crate::error::AppError;
use crate::models::{ProductFeature, ProductWithStore, Store};
use crate::state::AppState;

/// A store page: the store and its available products.
#[derive(Debug, Serialize)]
pub struct StorePage {
    pub store: Store,
    pub products: Vec<ProductWithStore>,
}

/// A product page: the product, its store and its features.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    #[serde(flatten)]
    pub product: ProductWithStore,
    pub features: Vec<ProductFeature>,
}

/// Product listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub store: Option<StoreId>,
    pub q: Option<String>,
}

fn catalog(state: &AppState) -> CatalogRepository<'_> {
    CatalogRepository::new(DataScope::anonymous(state.data()))
}

/// Active stores, newest first.
#[instrument(skip(state))]
pub async fn stores(State(state): State<AppState>) -> Result<Json<Vec<Store>>, AppError> {
    Ok(Json(catalog(&state).active_stores().await?))
}

/// One active store with its products.
#[instrument(skip(state))]
pub async fn store(
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
) -> Result<Json<StorePage>, AppError> {
    let catalog = catalog(&state);
    let store = catalog
        .active_store(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("store {id}")))?;
    let products = catalog.available_products(Some(id), None).await?;
    Ok(Json(StorePage { store, products }))
}

/// Available products, optionally narrowed by store and name.
#[instrument(skip(state))]
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductWithStore>>, AppError> {
    let products = catalog(&state)
        .available_products(query.store, query.q.as_deref())
        .await?;
    Ok(Json(products))
}

/// One available product with its features.
#[instrument(skip(state))]
pub async fn product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductPage>, AppError> {
    let catalog = catalog(&state);
    let product = catalog
        .available_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    let features = catalog.features(id).await?;
    Ok(Json(ProductPage { product, features }))
}
