//! Roles, statuses and other closed vocabularies stored by the backend.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A role granted through the backend's `user_roles` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Marketplace oversight.
    Admin,
    /// Owns a store and its products.
    Seller,
    /// Places orders.
    Customer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Seller => write!(f, "seller"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "seller" => Ok(Self::Seller),
            "customer" => Ok(Self::Customer),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// The set of roles held by a signed-in user.
///
/// Derived from `user_roles` on every auth state change; never refreshed
/// in between.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// An empty set (signed out).
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Whether the set contains `role`.
    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.contains(Role::Admin)
    }

    #[must_use]
    pub fn is_seller(&self) -> bool {
        self.contains(Role::Seller)
    }

    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.contains(Role::Customer)
    }

    /// Iterate roles in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Message sent to the customer when a seller moves an order into this status.
    #[must_use]
    pub const fn customer_message(self) -> &'static str {
        match self {
            Self::Confirmed => "سفارش شما تایید شد",
            Self::Processing => "سفارش شما در حال آماده‌سازی است",
            Self::Shipped => "سفارش شما ارسال شد",
            Self::Delivered => "سفارش شما تحویل داده شد",
            Self::Cancelled => "سفارش شما لغو شد",
            Self::Pending => "وضعیت سفارش شما تغییر کرد",
        }
    }

    /// Backend column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Product catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    #[default]
    General,
    Flowers,
    Bouquets,
    Plants,
    Accessories,
    Gifts,
}

impl ProductCategory {
    /// Display label in the storefront language.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::General => "عمومی",
            Self::Flowers => "گل‌ها",
            Self::Bouquets => "دسته گل",
            Self::Plants => "گیاهان",
            Self::Accessories => "لوازم جانبی",
            Self::Gifts => "هدایا",
        }
    }
}

impl std::str::FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "flowers" => Ok(Self::Flowers),
            "bouquets" => Ok(Self::Bouquets),
            "plants" => Ok(Self::Plants),
            "accessories" => Ok(Self::Accessories),
            "gifts" => Ok(Self::Gifts),
            _ => Err(format!("invalid category: {s}")),
        }
    }
}

/// Kind of an in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A customer placed an order in the recipient's store.
    NewOrder,
    /// A seller changed the status of the recipient's order.
    OrderStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [Role::Admin, Role::Seller, Role::Customer] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_set_membership() {
        let roles: RoleSet = [Role::Seller, Role::Customer, Role::Seller].into_iter().collect();
        assert!(roles.is_seller());
        assert!(roles.is_customer());
        assert!(!roles.is_admin());
        assert_eq!(roles.iter().count(), 2);
        assert!(RoleSet::empty().is_empty());
    }

    #[test]
    fn test_role_set_serializes_as_list() {
        let roles: RoleSet = [Role::Customer, Role::Admin].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&roles).unwrap(),
            "[\"admin\",\"customer\"]"
        );
    }

    #[test]
    fn test_order_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(OrderStatus::Shipped.as_str(), "shipped");
    }

    #[test]
    fn test_category_parse_and_label() {
        assert_eq!(
            "bouquets".parse::<ProductCategory>().unwrap(),
            ProductCategory::Bouquets
        );
        assert!("cars".parse::<ProductCategory>().is_err());
        assert_eq!(ProductCategory::Plants.label(), "گیاهان");
    }

    #[test]
    fn test_notification_kind_wire_format() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::NewOrder).unwrap(),
            "\"new_order\""
        );
    }
}
