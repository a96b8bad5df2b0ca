//! Stores, products and product features.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use golzar_core::{Price, ProductCategory, ProductFeatureId, ProductId, StoreId, UserId};

/// A seller's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Store columns embedded in product and order rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    #[serde(default)]
    pub id: Option<StoreId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Owner columns embedded in a store row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A store with its owner's name, for the admin view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreWithOwner {
    #[serde(flatten)]
    pub store: Store,
    #[serde(default, rename = "profiles")]
    pub owner: Option<OwnerSummary>,
}

/// A product listed by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_available: bool,
    #[serde(default)]
    pub category: ProductCategory,
    pub created_at: DateTime<Utc>,
}

/// A product with the store it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWithStore {
    #[serde(flatten)]
    pub product: Product,
    #[serde(default, rename = "stores")]
    pub store: Option<StoreSummary>,
}

impl ProductWithStore {
    /// Store name, or empty when the store row is not visible.
    #[must_use]
    pub fn store_name(&self) -> &str {
        self.store.as_ref().map_or("", |s| s.name.as_str())
    }
}

/// A name/value attribute shown on the product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFeature {
    pub id: ProductFeatureId,
    pub product_id: ProductId,
    pub feature_name: String,
    pub feature_value: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_with_embedded_store() {
        let json = serde_json::json!({
            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "store_id": "16fd2706-8baf-433b-82eb-8c7fada847da",
            "name": "رز قرمز",
            "description": null,
            "price": "100000",
            "stock": 5,
            "image_url": null,
            "is_available": true,
            "category": "flowers",
            "created_at": "2026-03-01T10:00:00.123456+00:00",
            "stores": {"name": "گل سرخ"}
        });

        let product: ProductWithStore = serde_json::from_value(json).unwrap();
        assert_eq!(product.store_name(), "گل سرخ");
        assert_eq!(product.product.category, ProductCategory::Flowers);
        assert_eq!(product.product.price, Price::from_toman(100_000));
    }

    #[test]
    fn test_missing_category_defaults_to_general() {
        let json = serde_json::json!({
            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "store_id": "16fd2706-8baf-433b-82eb-8c7fada847da",
            "name": "گلدان",
            "price": 50000,
            "stock": 1,
            "is_available": true,
            "created_at": "2026-03-01T10:00:00Z"
        });

        let product: Product = serde_json::from_value(json).unwrap();
        assert_eq!(product.category, ProductCategory::General);
    }
}
