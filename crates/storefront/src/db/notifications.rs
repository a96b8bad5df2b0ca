//! In-app notifications.

use serde_json::json;
use tracing::instrument;

use golzar_core::{NotificationId, UserId};

use super::{DataScope, RepositoryError};
use crate::backend::{Query, Table};
use crate::models::Notification;
use crate::models::notification::NewNotification;

/// Repository for the `notifications` table.
pub struct NotificationRepository<'a> {
    scope: DataScope<'a>,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(scope: DataScope<'a>) -> Self {
        Self { scope }
    }

    /// Insert a notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or the row cannot
    /// be encoded.
    #[instrument(skip(self, notification), fields(recipient = %notification.user_id))]
    pub async fn insert(&self, notification: &NewNotification) -> Result<Notification, RepositoryError> {
        let row = serde_json::to_value(notification)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        self.scope.insert_one(Table::Notifications, row).await
    }

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<Notification>, RepositoryError> {
        self.scope
            .select(
                Table::Notifications,
                &Query::new().eq("user_id", user).order_desc("created_at"),
            )
            .await
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn unread_count(&self, user: UserId) -> Result<u64, RepositoryError> {
        self.scope
            .count(
                Table::Notifications,
                &Query::new().eq("user_id", user).eq("is_read", false),
            )
            .await
    }

    /// Mark one of the user's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not belong to the user.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, user: UserId, id: NotificationId) -> Result<Notification, RepositoryError> {
        self.scope
            .update_one(
                Table::Notifications,
                &Query::new().eq("id", id).eq("user_id", user),
                json!({ "is_read": true }),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
