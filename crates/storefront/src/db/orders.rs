//! Orders and order items.

use serde_json::json;
use tracing::instrument;

use golzar_core::{AddressId, OrderId, OrderStatus, Price, StoreId, UserId};

use super::{DataScope, RepositoryError};
use crate::backend::{Query, Table};
use crate::models::order::AdminOrder;
use crate::models::{CartItem, CustomerOrder, Order, OrderItem, StoreOrder};

/// An order to insert.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub customer_id: UserId,
    pub store_id: StoreId,
    pub address_id: AddressId,
    pub total_amount: Price,
    pub notes: Option<&'a str>,
}

/// Repository for the `orders` and `order_items` tables.
pub struct OrderRepository<'a> {
    scope: DataScope<'a>,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(scope: DataScope<'a>) -> Self {
        Self { scope }
    }

    /// Insert a pending order and return it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, order), fields(store_id = %order.store_id, total = %order.total_amount))]
    pub async fn insert_order(&self, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
        self.scope
            .insert_one(
                Table::Orders,
                json!({
                    "customer_id": order.customer_id,
                    "store_id": order.store_id,
                    "address_id": order.address_id,
                    "total_amount": order.total_amount,
                    "notes": order.notes,
                    "status": OrderStatus::Pending,
                }),
            )
            .await
    }

    /// Delete an order of `customer`, returning whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, customer: UserId, id: OrderId) -> Result<bool, RepositoryError> {
        let removed = self
            .scope
            .delete(
                Table::Orders,
                &Query::new().eq("id", id).eq("customer_id", customer),
            )
            .await?;
        Ok(removed > 0)
    }

    /// Insert one item per cart line, snapshotting name and price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, lines), fields(count = lines.len()))]
    pub async fn insert_items(
        &self,
        order: OrderId,
        lines: &[&CartItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = lines
            .iter()
            .map(|line| {
                json!({
                    "order_id": order,
                    "product_id": line.product_id,
                    "product_name": line.name,
                    "quantity": line.quantity,
                    "price": line.price,
                })
            })
            .collect();
        self.scope.insert(Table::OrderItems, rows).await
    }

    /// A customer's orders with store, address and items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn for_customer(&self, customer: UserId) -> Result<Vec<CustomerOrder>, RepositoryError> {
        self.scope
            .select(
                Table::Orders,
                &Query::new()
                    .select("*,stores(name),addresses(title,full_address),order_items(product_name,quantity,price)")
                    .eq("customer_id", customer)
                    .order_desc("created_at"),
            )
            .await
    }

    /// Orders received by a store with delivery address and items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn for_store(&self, store: StoreId) -> Result<Vec<StoreOrder>, RepositoryError> {
        self.scope
            .select(
                Table::Orders,
                &Query::new()
                    .select("*,addresses(title,full_address,phone),order_items(product_name,quantity,price)")
                    .eq("store_id", store)
                    .order_desc("created_at"),
            )
            .await
    }

    /// An order of `store` by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn of_store(&self, store: StoreId, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.scope
            .select_one(
                Table::Orders,
                Query::new().eq("id", id).eq("store_id", store),
            )
            .await
    }

    /// Set the status of an order of `store`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is not in the store.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        store: StoreId,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        self.scope
            .update_one(
                Table::Orders,
                &Query::new().eq("id", id).eq("store_id", store),
                json!({ "status": status }),
            )
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Items of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn items(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        self.scope
            .select(Table::OrderItems, &Query::new().eq("order_id", order))
            .await
    }

    /// Most recent orders across all stores.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: usize) -> Result<Vec<AdminOrder>, RepositoryError> {
        self.scope
            .select(
                Table::Orders,
                &Query::new()
                    .select("*,stores(name)")
                    .order_desc("created_at")
                    .limit(limit),
            )
            .await
    }

    /// Number of orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        self.scope.count(Table::Orders, &Query::new()).await
    }
}
