//! Signed-in cart lines (`cart_items`).

use serde_json::json;
use tracing::instrument;

use golzar_core::{CartItemId, ProductId, UserId};

use super::{DataScope, RepositoryError};
use crate::backend::{Query, Table};
use crate::models::{CartItem, CartItemRow};

/// Conflict target for the one-line-per-product rule.
const USER_PRODUCT: &[&str] = &["user_id", "product_id"];

/// Repository for the `cart_items` table.
pub struct CartItemRepository<'a> {
    scope: DataScope<'a>,
}

impl<'a> CartItemRepository<'a> {
    #[must_use]
    pub const fn new(scope: DataScope<'a>) -> Self {
        Self { scope }
    }

    /// All lines of a user's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<CartItemRow>, RepositoryError> {
        self.scope
            .select(
                Table::CartItems,
                &Query::new().eq("user_id", user).order_asc("created_at"),
            )
            .await
    }

    /// The user's line for a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn find(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<Option<CartItemRow>, RepositoryError> {
        self.scope
            .select_one(
                Table::CartItems,
                Query::new().eq("user_id", user).eq("product_id", product),
            )
            .await
    }

    /// Insert a new line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a line for
    /// the product.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn insert(&self, user: UserId, item: &CartItem) -> Result<CartItemRow, RepositoryError> {
        self.scope
            .insert_one(Table::CartItems, row_for(user, item))
            .await
    }

    /// Insert a line or overwrite the existing line for the same product.
    ///
    /// The stored quantity becomes `item.quantity`; callers compute merged
    /// quantities before calling.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, item), fields(product_id = %item.product_id, quantity = item.quantity))]
    pub async fn upsert(&self, user: UserId, item: &CartItem) -> Result<CartItemRow, RepositoryError> {
        let mut row = row_for(user, item);
        // Keep the existing row's id on conflict.
        if let Some(map) = row.as_object_mut() {
            map.remove("id");
        }
        self.scope
            .upsert_one(Table::CartItems, row, USER_PRODUCT)
            .await
    }

    /// Set the quantity of one line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to the user.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItemRow, RepositoryError> {
        self.scope
            .update_one(
                Table::CartItems,
                &Query::new().eq("id", id).eq("user_id", user),
                json!({ "quantity": quantity }),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete one line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, user: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        self.scope
            .delete(Table::CartItems, &Query::new().eq("id", id).eq("user_id", user))
            .await?;
        Ok(())
    }

    /// Delete several lines (e.g. the ones just ordered).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_many(&self, user: UserId, ids: &[CartItemId]) -> Result<(), RepositoryError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.scope
            .delete(
                Table::CartItems,
                &Query::new().eq("user_id", user).in_list("id", ids),
            )
            .await?;
        Ok(())
    }

    /// Delete every line of the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self))]
    pub async fn delete_all(&self, user: UserId) -> Result<(), RepositoryError> {
        self.scope
            .delete(Table::CartItems, &Query::new().eq("user_id", user))
            .await?;
        Ok(())
    }
}

fn row_for(user: UserId, item: &CartItem) -> serde_json::Value {
    json!({
        "id": item.id,
        "user_id": user,
        "product_id": item.product_id,
        "product_name": item.name,
        "price": item.price,
        "quantity": item.quantity,
        "image_url": item.image_url,
        "store_id": item.store_id,
        "store_name": item.store_name,
        "max_stock": item.max_stock,
    })
}
