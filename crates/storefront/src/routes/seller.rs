//! Seller dashboard: the seller's store, products, features and orders.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use golzar_core::{OrderId, OrderStatus, ProductFeatureId, ProductId};

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::RequireSeller;
use crate::models::{Order, Product, ProductFeature, Store, StoreOrder};
use crate::services::seller::SellerService;
use crate::state::AppState;
use crate::validation::{FeaturesForm, ProductForm, StoreForm, Validate};

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// The seller's store; `null` before one is created.
#[instrument(skip_all)]
pub async fn store(
    State(state): State<AppState>,
    seller: RequireSeller,
) -> Result<Json<Option<Store>>, AppError> {
    let user = seller.into_user();
    Ok(Json(SellerService::new(state.data(), &user).store().await?))
}

/// Open the seller's store. A seller has at most one.
#[instrument(skip_all)]
pub async fn create_store(
    State(state): State<AppState>,
    seller: RequireSeller,
    JsonBody(form): JsonBody<StoreForm>,
) -> Result<(StatusCode, Json<Store>), AppError> {
    let user = seller.into_user();
    let form = form.validate()?;
    let store = SellerService::new(state.data(), &user)
        .create_store(&form)
        .await?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// Edit the seller's store.
#[instrument(skip_all)]
pub async fn update_store(
    State(state): State<AppState>,
    seller: RequireSeller,
    JsonBody(form): JsonBody<StoreForm>,
) -> Result<Json<Store>, AppError> {
    let user = seller.into_user();
    let form = form.validate()?;
    let store = SellerService::new(state.data(), &user)
        .update_store(&form)
        .await?;
    Ok(Json(store))
}

/// Every product of the store, including unavailable ones.
#[instrument(skip_all)]
pub async fn products(
    State(state): State<AppState>,
    seller: RequireSeller,
) -> Result<Json<Vec<Product>>, AppError> {
    let user = seller.into_user();
    Ok(Json(SellerService::new(state.data(), &user).products().await?))
}

#[instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    seller: RequireSeller,
    JsonBody(form): JsonBody<ProductForm>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let user = seller.into_user();
    let form = form.validate()?;
    let product = SellerService::new(state.data(), &user)
        .create_product(&form)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, seller, form))]
pub async fn update_product(
    State(state): State<AppState>,
    seller: RequireSeller,
    Path(id): Path<ProductId>,
    JsonBody(form): JsonBody<ProductForm>,
) -> Result<Json<Product>, AppError> {
    let user = seller.into_user();
    let form = form.validate()?;
    let product = SellerService::new(state.data(), &user)
        .update_product(id, &form)
        .await?;
    Ok(Json(product))
}

#[instrument(skip(state, seller))]
pub async fn delete_product(
    State(state): State<AppState>,
    seller: RequireSeller,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    let user = seller.into_user();
    SellerService::new(state.data(), &user)
        .delete_product(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, seller))]
pub async fn features(
    State(state): State<AppState>,
    seller: RequireSeller,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<ProductFeature>>, AppError> {
    let user = seller.into_user();
    Ok(Json(SellerService::new(state.data(), &user).features(id).await?))
}

/// Save the product's feature list: entries with an `id` are updated, the
/// rest are added.
#[instrument(skip(state, seller, form))]
pub async fn save_features(
    State(state): State<AppState>,
    seller: RequireSeller,
    Path(id): Path<ProductId>,
    JsonBody(form): JsonBody<FeaturesForm>,
) -> Result<Json<Vec<ProductFeature>>, AppError> {
    let user = seller.into_user();
    let features = form.validate()?;
    let saved = SellerService::new(state.data(), &user)
        .save_features(id, &features)
        .await?;
    Ok(Json(saved))
}

#[instrument(skip(state, seller))]
pub async fn delete_feature(
    State(state): State<AppState>,
    seller: RequireSeller,
    Path(id): Path<ProductFeatureId>,
) -> Result<StatusCode, AppError> {
    let user = seller.into_user();
    SellerService::new(state.data(), &user)
        .delete_feature(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Orders placed with the store, newest first.
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    seller: RequireSeller,
) -> Result<Json<Vec<StoreOrder>>, AppError> {
    let user = seller.into_user();
    Ok(Json(SellerService::new(state.data(), &user).orders().await?))
}

/// Move an order to a new status and notify the customer.
#[instrument(skip(state, seller))]
pub async fn change_order_status(
    State(state): State<AppState>,
    seller: RequireSeller,
    Path(id): Path<OrderId>,
    JsonBody(change): JsonBody<StatusChange>,
) -> Result<Json<Order>, AppError> {
    let user = seller.into_user();
    let order = SellerService::new(state.data(), &user)
        .change_order_status(id, change.status)
        .await?;
    Ok(Json(order))
}
