//! Orders and order items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use golzar_core::{AddressId, OrderId, OrderItemId, OrderStatus, Price, ProductId, StoreId, UserId};

use super::catalog::StoreSummary;

/// Row of the `orders` table. One order covers one store's slice of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub store_id: StoreId,
    #[serde(default)]
    pub address_id: Option<AddressId>,
    pub total_amount: Price,
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row of the `order_items` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: u32,
    pub price: Price,
}

/// Address columns embedded in order rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSummary {
    pub title: String,
    pub full_address: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Item columns embedded in order rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_name: String,
    pub quantity: u32,
    pub price: Price,
}

/// An order as shown in the customer's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrder {
    #[serde(flatten)]
    pub order: Order,
    #[serde(default, rename = "stores")]
    pub store: Option<StoreSummary>,
    #[serde(default, rename = "addresses")]
    pub address: Option<AddressSummary>,
    #[serde(default, rename = "order_items")]
    pub items: Vec<OrderLine>,
}

/// An order as shown to the store that received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOrder {
    #[serde(flatten)]
    pub order: Order,
    #[serde(default, rename = "addresses")]
    pub address: Option<AddressSummary>,
    #[serde(default, rename = "order_items")]
    pub items: Vec<OrderLine>,
}

/// An order in the admin's recent-orders list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOrder {
    #[serde(flatten)]
    pub order: Order,
    #[serde(default, rename = "stores")]
    pub store: Option<StoreSummary>,
}
