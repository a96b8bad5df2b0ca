//! Account route handlers (profile, addresses, orders, notifications).
//!
//! All routes require authentication via the [`RequireAuth`] extractor.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use golzar_core::{AddressId, NotificationId};

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{Address, CustomerOrder, Notification, Profile};
use crate::services::account::AccountService;
use crate::state::AppState;
use crate::validation::{AddressForm, ProfileForm, Validate};

#[derive(Debug, Serialize)]
pub struct NotificationsView {
    pub unread: u64,
    pub notifications: Vec<Notification>,
}

/// Display the profile.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(AccountService::new(state.data(), &user).profile().await?))
}

/// Update name and phone.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(form): JsonBody<ProfileForm>,
) -> Result<Json<Profile>, AppError> {
    let form = form.validate()?;
    let profile = AccountService::new(state.data(), &user)
        .update_profile(&form)
        .await?;
    Ok(Json(profile))
}

/// List addresses, default first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>, AppError> {
    Ok(Json(AccountService::new(state.data(), &user).addresses().await?))
}

/// Create an address.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(form): JsonBody<AddressForm>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let form = form.validate()?;
    let address = AccountService::new(state.data(), &user)
        .create_address(&form)
        .await?;
    tracing::info!(address_id = %address.id, "Address created");
    Ok((StatusCode::CREATED, Json(address)))
}

/// Replace an address.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    JsonBody(form): JsonBody<AddressForm>,
) -> Result<Json<Address>, AppError> {
    let form = form.validate()?;
    let address = AccountService::new(state.data(), &user)
        .update_address(id, &form)
        .await?;
    Ok(Json(address))
}

/// Delete an address.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode, AppError> {
    AccountService::new(state.data(), &user)
        .delete_address(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Order history with store names and lines.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<CustomerOrder>>, AppError> {
    Ok(Json(AccountService::new(state.data(), &user).orders().await?))
}

/// Notifications, newest first, with the unread count.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn notifications(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<NotificationsView>, AppError> {
    let service = AccountService::new(state.data(), &user);
    Ok(Json(NotificationsView {
        unread: service.unread_notifications().await?,
        notifications: service.notifications().await?,
    }))
}

/// Mark one notification read.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<NotificationId>,
) -> Result<Json<Notification>, AppError> {
    let notification = AccountService::new(state.data(), &user)
        .mark_notification_read(id)
        .await?;
    Ok(Json(notification))
}
