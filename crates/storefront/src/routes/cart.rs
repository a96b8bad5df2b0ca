//! Cart route handlers.
//!
//! Guests get a session cart; signed-in users get their backend cart. Every
//! mutation answers with the whole cart so the client can re-render from it.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use golzar_core::{CartItemId, Price, ProductId, StoreId};

use super::JsonBody;
use crate::db::{CatalogRepository, DataScope};
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::CartItem;
use crate::services::cart::{Cart, add_product, open_cart};
use crate::state::AppState;

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub stores: Vec<StoreGroupView>,
    pub total_items: u32,
    pub total_price: Price,
}

/// Per-store subtotal; each becomes one order at checkout.
#[derive(Debug, Serialize)]
pub struct StoreGroupView {
    pub store_id: StoreId,
    pub store_name: String,
    pub item_count: usize,
    pub total: Price,
}

impl From<&Cart<'_>> for CartView {
    fn from(cart: &Cart<'_>) -> Self {
        Self {
            items: cart.items().to_vec(),
            stores: cart
                .group_by_store()
                .iter()
                .map(|group| StoreGroupView {
                    store_id: group.store_id,
                    store_name: group.store_name.to_string(),
                    item_count: group.items.len(),
                    total: group.total(),
                })
                .collect(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub item_id: CartItemId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub item_id: CartItemId,
}

/// Show the cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>, AppError> {
    let cart = open_cart(&session, user.as_ref(), state.data()).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Add a product. Name, price, store and stock are read from the catalog,
/// never from the request, and the added quantity is reserved from stock.
#[instrument(skip(state, session, user, request), fields(product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    JsonBody(request): JsonBody<AddToCartRequest>,
) -> Result<Json<CartView>, AppError> {
    let product = CatalogRepository::new(DataScope::anonymous(state.data()))
        .available_product(request.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", request.product_id)))?;

    let scope = user.as_ref().map_or_else(
        || DataScope::anonymous(state.data()),
        |user| DataScope::authenticated(state.data(), &user.access_token),
    );
    let mut cart = open_cart(&session, user.as_ref(), state.data()).await?;
    let line = add_product(&mut cart, &CatalogRepository::new(scope), product, request.quantity).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        &[
            ("product_id", line.product_id.to_string()),
            ("quantity", line.quantity.to_string()),
        ],
    );
    Ok(Json(CartView::from(&cart)))
}

/// Set a line's quantity; clamped to `[1, max_stock]`.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    JsonBody(request): JsonBody<UpdateCartRequest>,
) -> Result<Json<CartView>, AppError> {
    let mut cart = open_cart(&session, user.as_ref(), state.data()).await?;
    cart.update_quantity(request.item_id, request.quantity).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Remove a line.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    JsonBody(request): JsonBody<RemoveFromCartRequest>,
) -> Result<Json<CartView>, AppError> {
    let mut cart = open_cart(&session, user.as_ref(), state.data()).await?;
    cart.remove_item(request.item_id).await?;

    add_breadcrumb(
        "cart",
        "Removed from cart",
        &[("item_id", request.item_id.to_string())],
    );
    Ok(Json(CartView::from(&cart)))
}

/// Empty the cart.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>, AppError> {
    let mut cart = open_cart(&session, user.as_ref(), state.data()).await?;
    cart.clear().await?;
    Ok(Json(CartView::from(&cart)))
}
