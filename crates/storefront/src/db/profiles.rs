//! Profiles and role grants.

use serde_json::json;
use tracing::instrument;

use golzar_core::{RoleSet, UserId};

use super::{DataScope, RepositoryError};
use crate::backend::{Query, Table};
use crate::models::account::RoleRow;
use crate::models::{Profile, ProfileWithRoles};
use crate::validation::ValidProfile;

/// Repository for the `profiles` and `user_roles` tables.
pub struct ProfileRepository<'a> {
    scope: DataScope<'a>,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(scope: DataScope<'a>) -> Self {
        Self { scope }
    }

    /// A user's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn get(&self, user: UserId) -> Result<Option<Profile>, RepositoryError> {
        self.scope
            .select_one(Table::Profiles, Query::new().eq("id", user))
            .await
    }

    /// Update a user's name and phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    #[instrument(skip(self, profile))]
    pub async fn update(&self, user: UserId, profile: &ValidProfile) -> Result<Profile, RepositoryError> {
        self.scope
            .update_one(
                Table::Profiles,
                &Query::new().eq("id", user),
                json!({
                    "full_name": profile.full_name,
                    "phone": profile.phone.as_ref().map(|p| p.as_str()),
                }),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Roles granted to a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a role is unknown.
    #[instrument(skip(self))]
    pub async fn roles(&self, user: UserId) -> Result<RoleSet, RepositoryError> {
        let rows: Vec<RoleRow> = self
            .scope
            .select(
                Table::UserRoles,
                &Query::new().select("role").eq("user_id", user),
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.role).collect())
    }

    /// Most recently created profiles with their roles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn recent_with_roles(&self, limit: usize) -> Result<Vec<ProfileWithRoles>, RepositoryError> {
        self.scope
            .select(
                Table::Profiles,
                &Query::new()
                    .select("*,user_roles(role)")
                    .order_desc("created_at")
                    .limit(limit),
            )
            .await
    }

    /// Number of profiles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        self.scope.count(Table::Profiles, &Query::new()).await
    }
}
