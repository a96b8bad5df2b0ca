//! Admin dashboard routes.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use golzar_core::StoreId;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::Store;
use crate::services::admin::{AdminService, Dashboard};
use crate::state::AppState;

/// Platform stats, stores with owners, recent orders and users.
#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    admin: RequireAdmin,
) -> Result<Json<Dashboard>, AppError> {
    let user = admin.into_user();
    Ok(Json(AdminService::new(state.data(), &user).dashboard().await?))
}

/// Activate or deactivate a store.
#[instrument(skip(state, admin))]
pub async fn toggle_store(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<StoreId>,
) -> Result<Json<Store>, AppError> {
    let user = admin.into_user();
    let store = AdminService::new(state.data(), &user).toggle_store(id).await?;
    tracing::info!(admin_id = %user.id, store_id = %id, "Store activation toggled");
    Ok(Json(store))
}
