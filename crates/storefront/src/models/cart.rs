//! Cart line items.

use serde::{Deserialize, Serialize};

use golzar_core::{CartItemId, Price, ProductId, StoreId, UserId};

/// One line of a cart.
///
/// The same shape is used for guest carts in the session and for the JSON
/// API; product, store and stock fields are snapshots taken when the line
/// was first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    pub store_id: StoreId,
    pub store_name: String,
    /// Stock ceiling for `quantity`.
    pub max_stock: u32,
}

impl CartItem {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// A product to add to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    pub store_id: StoreId,
    pub store_name: String,
    pub max_stock: u32,
    /// Requested quantity; missing or zero means one.
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl NewCartItem {
    /// Requested quantity with the default applied.
    #[must_use]
    pub fn requested_quantity(&self) -> u32 {
        self.quantity.filter(|q| *q > 0).unwrap_or(1)
    }

    /// Build a line with the given id and quantity.
    #[must_use]
    pub fn into_item(self, id: CartItemId, quantity: u32) -> CartItem {
        CartItem {
            id,
            product_id: self.product_id,
            name: self.name,
            price: self.price,
            quantity,
            image_url: self.image_url,
            store_id: self.store_id,
            store_name: self.store_name,
            max_stock: self.max_stock,
        }
    }
}

/// Row of the `cart_items` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRow {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    pub store_id: StoreId,
    pub store_name: String,
    pub max_stock: u32,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            name: row.product_name,
            price: row.price,
            quantity: row.quantity,
            image_url: row.image_url,
            store_id: row.store_id,
            store_name: row.store_name,
            max_stock: row.max_stock,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_quantity_defaults_to_one() {
        let mut item = NewCartItem {
            product_id: ProductId::random(),
            name: "رز".to_string(),
            price: Price::from_toman(100_000),
            image_url: None,
            store_id: StoreId::random(),
            store_name: "گل سرخ".to_string(),
            max_stock: 5,
            quantity: None,
        };
        assert_eq!(item.requested_quantity(), 1);
        item.quantity = Some(0);
        assert_eq!(item.requested_quantity(), 1);
        item.quantity = Some(3);
        assert_eq!(item.requested_quantity(), 3);
    }

    #[test]
    fn test_reads_legacy_local_storage_shape() {
        let json = serde_json::json!([{
            "id": "0f8fad5b-d9cb-469f-a165-70867728950e",
            "productId": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "name": "رز قرمز",
            "price": 100000,
            "quantity": 2,
            "image_url": null,
            "store_id": "16fd2706-8baf-433b-82eb-8c7fada847da",
            "store_name": "گل سرخ",
            "max_stock": 5
        }]);

        let items: Vec<CartItem> = serde_json::from_value(json).unwrap();
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].line_total(), Price::from_toman(200_000));
    }
}
