//! Delivery addresses.

use serde_json::{Value, json};
use tracing::instrument;

use golzar_core::{AddressId, UserId};

use super::{DataScope, RepositoryError};
use crate::backend::{Query, Table};
use crate::models::Address;
use crate::validation::ValidAddress;

/// Repository for the `addresses` table.
pub struct AddressRepository<'a> {
    scope: DataScope<'a>,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(scope: DataScope<'a>) -> Self {
        Self { scope }
    }

    /// A user's addresses, default first then newest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        self.scope
            .select(
                Table::Addresses,
                &Query::new()
                    .eq("user_id", user)
                    .order_desc("is_default")
                    .order_desc("created_at"),
            )
            .await
    }

    /// One of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn get(&self, user: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        self.scope
            .select_one(
                Table::Addresses,
                Query::new().eq("id", id).eq("user_id", user),
            )
            .await
    }

    /// Unmark every default address of the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self))]
    pub async fn clear_defaults(&self, user: UserId) -> Result<(), RepositoryError> {
        self.scope
            .update::<Address>(
                Table::Addresses,
                &Query::new().eq("user_id", user).eq("is_default", true),
                json!({ "is_default": false }),
            )
            .await?;
        Ok(())
    }

    /// Insert an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, address))]
    pub async fn insert(&self, user: UserId, address: &ValidAddress) -> Result<Address, RepositoryError> {
        let mut row = address_row(address);
        row["user_id"] = json!(user);
        self.scope.insert_one(Table::Addresses, row).await
    }

    /// Replace the fields of one of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    #[instrument(skip(self, address))]
    pub async fn update(
        &self,
        user: UserId,
        id: AddressId,
        address: &ValidAddress,
    ) -> Result<Address, RepositoryError> {
        self.scope
            .update_one(
                Table::Addresses,
                &Query::new().eq("id", id).eq("user_id", user),
                address_row(address),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete one of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the user.
    #[instrument(skip(self))]
    pub async fn delete(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let removed = self
            .scope
            .delete(
                Table::Addresses,
                &Query::new().eq("id", id).eq("user_id", user),
            )
            .await?;
        if removed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

fn address_row(address: &ValidAddress) -> Value {
    json!({
        "title": address.title,
        "full_address": address.full_address,
        "phone": address.phone.as_str(),
        "postal_code": address.postal_code,
        "is_default": address.is_default,
    })
}
