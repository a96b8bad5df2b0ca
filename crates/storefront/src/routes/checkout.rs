//! Checkout: one order per store in the signed-in user's cart.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use golzar_core::AddressId;

use super::JsonBody;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::cart::open_cart;
use crate::services::checkout::{CheckoutRequest, place_orders};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub address_id: AddressId,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Place the orders. Answers `201` with the new orders.
///
/// When a later store fails, the error body lists the orders that were
/// already placed under `placed_orders`; their lines are gone from the cart.
#[instrument(skip(state, session, user, body), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    JsonBody(body): JsonBody<CheckoutBody>,
) -> Result<(StatusCode, Json<Vec<Order>>), AppError> {
    let mut cart = open_cart(&session, Some(&user), state.data()).await?;
    let request = CheckoutRequest {
        address_id: body.address_id,
        notes: body.notes.as_deref(),
    };
    let orders = place_orders(&mut cart, &user, state.data(), request).await?;

    add_breadcrumb(
        "checkout",
        "Orders placed",
        &[("count", orders.len().to_string())],
    );
    Ok((StatusCode::CREATED, Json(orders)))
}
