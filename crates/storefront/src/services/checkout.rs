//! Checkout: turn the cart into one order per store.
//!
//! Store groups are placed one after another, each as three backend calls:
//! insert the order, insert its items, notify the store owner. There is no
//! transaction across groups. When a group fails, the groups already placed
//! stay placed and their lines leave the cart; the failed group and every
//! group after it stay in the cart so the customer can retry them.

use thiserror::Error;
use tracing::instrument;

use golzar_core::{AddressId, CartItemId, NotificationKind, OrderId, UserId};

use crate::backend::DataApi;
use crate::db::{
    AddressRepository, CatalogRepository, DataScope, NewOrder, NotificationRepository,
    OrderRepository, RepositoryError,
};
use crate::models::notification::NewNotification;
use crate::models::{CurrentUser, Order};
use crate::services::cart::{Cart, StoreGroup};
use crate::validation::{FieldErrors, validate_notes};

/// Notification title shown to store owners.
const NEW_ORDER_TITLE: &str = "سفارش جدید";

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// The address is not one of the customer's.
    #[error("address not found")]
    AddressNotFound,

    /// Notes failed validation.
    #[error("invalid checkout input")]
    Validation(FieldErrors),

    /// A store group failed after `placed` orders were committed.
    #[error("checkout stopped after {} order(s): {source}", placed.len())]
    Partial {
        placed: Vec<Order>,
        #[source]
        source: RepositoryError,
    },

    /// Backend call failed before any order was placed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout input.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'r> {
    pub address_id: AddressId,
    pub notes: Option<&'r str>,
}

/// Place one order per store group in the cart.
///
/// On full success the cart is cleared and the orders are returned in group
/// order.
///
/// # Errors
///
/// - `CheckoutError::EmptyCart`, `AddressNotFound` or `Validation` before
///   anything is written
/// - `CheckoutError::Partial` when a group fails; earlier groups stay placed
///   and their lines are removed from the cart
/// - `CheckoutError::Repository` when the first group fails
///
/// Once every group is placed the orders are returned even if clearing the
/// cart fails.
#[instrument(skip(cart, user, api, request), fields(user_id = %user.id, address_id = %request.address_id))]
pub async fn place_orders(
    cart: &mut Cart<'_>,
    user: &CurrentUser,
    api: &dyn DataApi,
    request: CheckoutRequest<'_>,
) -> Result<Vec<Order>, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let notes = validate_notes(request.notes).map_err(CheckoutError::Validation)?;

    let scope = DataScope::authenticated(api, &user.access_token);
    AddressRepository::new(scope)
        .get(user.id, request.address_id)
        .await?
        .ok_or(CheckoutError::AddressNotFound)?;

    let mut placed = Vec::new();
    let mut committed_lines: Vec<CartItemId> = Vec::new();
    let mut failure = None;

    for group in cart.group_by_store() {
        let new_order = NewOrder {
            customer_id: user.id,
            store_id: group.store_id,
            address_id: request.address_id,
            total_amount: group.total(),
            notes: notes.as_deref(),
        };
        match place_group(scope, &group, &new_order).await {
            Ok(order) => {
                committed_lines.extend(group.items.iter().map(|item| item.id));
                placed.push(order);
            }
            Err(e) => {
                tracing::error!(store_id = %group.store_id, error = %e, "Failed to place order group");
                failure = Some(e);
                break;
            }
        }
    }

    match failure {
        None => {
            if let Err(e) = cart.clear().await {
                tracing::error!(orders = placed.len(), error = %e, "Failed to clear cart after checkout");
            }
            tracing::info!(orders = placed.len(), "Checkout complete");
            Ok(placed)
        }
        Some(source) if placed.is_empty() => Err(CheckoutError::Repository(source)),
        Some(source) => {
            if let Err(e) = cart.remove_items(&committed_lines).await {
                tracing::error!(error = %e, "Failed to remove placed lines from cart");
            }
            tracing::warn!(orders = placed.len(), "Checkout partially complete");
            Err(CheckoutError::Partial { placed, source })
        }
    }
}

/// Insert the order and its items, then notify the store owner.
///
/// If the items cannot be written the order row is deleted again, so a failed
/// group leaves nothing behind for the customer to retry into a duplicate.
async fn place_group(
    scope: DataScope<'_>,
    group: &StoreGroup<'_>,
    new_order: &NewOrder<'_>,
) -> Result<Order, RepositoryError> {
    let orders = OrderRepository::new(scope);
    let order = orders.insert_order(new_order).await?;
    if let Err(e) = orders.insert_items(order.id, &group.items).await {
        match orders.delete_order(new_order.customer_id, order.id).await {
            Ok(true) => tracing::warn!(order_id = %order.id, "Removed order whose items failed to save"),
            Ok(false) => tracing::error!(order_id = %order.id, "Order without items was not found for removal"),
            Err(delete_err) => {
                tracing::error!(order_id = %order.id, error = %delete_err, "Order left without items");
            }
        }
        return Err(e);
    }

    notify_owner(scope, group, order.id).await;
    Ok(order)
}

/// Tell the store owner about a new order.
///
/// The order is already committed at this point; a failed notification is
/// logged and does not fail the group.
async fn notify_owner(scope: DataScope<'_>, group: &StoreGroup<'_>, order: OrderId) {
    let store = match CatalogRepository::new(scope).store(group.store_id).await {
        Ok(Some(store)) => store,
        Ok(None) => {
            tracing::warn!(store_id = %group.store_id, "Store of order not visible, owner not notified");
            return;
        }
        Err(e) => {
            tracing::warn!(store_id = %group.store_id, error = %e, "Failed to look up store owner");
            return;
        }
    };

    let notification = new_order_notification(store.owner_id, &store.name, group.items.len(), order);
    if let Err(e) = NotificationRepository::new(scope).insert(&notification).await {
        tracing::warn!(%order, error = %e, "Failed to notify store owner");
    }
}

fn new_order_notification(
    owner: UserId,
    store_name: &str,
    line_count: usize,
    order: OrderId,
) -> NewNotification {
    NewNotification {
        user_id: owner,
        title: NEW_ORDER_TITLE.to_string(),
        message: format!("سفارش جدیدی از {line_count} محصول در غرفه {store_name} ثبت شد"),
        kind: NotificationKind::NewOrder,
        related_order_id: Some(order),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use golzar_core::{Email, Price, ProductId, RoleSet, StoreId};
    use serde_json::json;
    use tower_sessions::{MemoryStore, Session};

    use super::*;
    use crate::backend::Table;
    use crate::backend::memory::MemoryBackend;
    use crate::models::NewCartItem;
    use crate::services::cart::open_cart;

    struct Fixture {
        backend: MemoryBackend,
        user: CurrentUser,
        address: AddressId,
        stores: [(StoreId, UserId); 2],
    }

    fn fixture() -> Fixture {
        let backend = MemoryBackend::new();
        let customer = backend.seed_user("buyer@example.ir", "secret1", "خریدار", &[]);
        let user = CurrentUser {
            id: customer,
            email: Email::parse("buyer@example.ir").unwrap(),
            full_name: None,
            roles: RoleSet::empty(),
            access_token: backend.access_token_for(customer),
            refresh_token: String::new(),
        };
        let address = backend.insert_row(
            Table::Addresses,
            json!({
                "user_id": customer,
                "title": "خانه",
                "full_address": "تهران، خیابان ولیعصر، پلاک ۱۲",
                "phone": "09121234567",
            }),
        );
        let stores = [("گل سرخ", "rose@example.ir"), ("گلستان", "golestan@example.ir")].map(|(name, email)| {
            let owner = backend.seed_user(email, "secret1", name, &[]);
            let store = backend.insert_row(Table::Stores, json!({ "name": name, "owner_id": owner }));
            (serde_json::from_value(store["id"].clone()).unwrap(), owner)
        });
        Fixture {
            user,
            address: serde_json::from_value(address["id"].clone()).unwrap(),
            stores,
            backend,
        }
    }

    fn line(store_id: StoreId, store_name: &str, price: i64, quantity: u32) -> NewCartItem {
        NewCartItem {
            product_id: ProductId::random(),
            name: "گل".to_string(),
            price: Price::from_toman(price),
            image_url: None,
            store_id,
            store_name: store_name.to_string(),
            max_stock: 10,
            quantity: Some(quantity),
        }
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_two_stores_produce_two_orders_and_notifications() {
        let f = fixture();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();
        let [(a, owner_a), (b, owner_b)] = f.stores;
        cart.add_item(line(a, "گل سرخ", 100_000, 2)).await.unwrap();
        cart.add_item(line(b, "گلستان", 45_000, 1)).await.unwrap();
        cart.add_item(line(a, "گل سرخ", 30_000, 1)).await.unwrap();

        let orders = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: Some("  زنگ نزنید  ") },
        )
        .await
        .unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].store_id, a);
        assert_eq!(orders[0].total_amount, Price::from_toman(230_000));
        assert_eq!(orders[0].notes.as_deref(), Some("زنگ نزنید"));
        assert_eq!(orders[1].store_id, b);
        assert_eq!(orders[1].total_amount, Price::from_toman(45_000));

        let items = f.backend.rows(Table::OrderItems);
        assert_eq!(items.len(), 3);
        let for_a = items.iter().filter(|i| i["order_id"] == json!(orders[0].id)).count();
        assert_eq!(for_a, 2);

        let notifications = f.backend.rows(Table::Notifications);
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0]["user_id"], json!(owner_a));
        assert_eq!(notifications[0]["type"], json!("new_order"));
        assert_eq!(
            notifications[0]["message"],
            json!("سفارش جدیدی از 2 محصول در غرفه گل سرخ ثبت شد")
        );
        assert_eq!(notifications[1]["user_id"], json!(owner_b));

        assert!(cart.is_empty());
        assert!(f.backend.rows(Table::CartItems).is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_unplaced_lines() {
        let f = fixture();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();
        let [(a, _), (b, _)] = f.stores;
        cart.add_item(line(a, "گل سرخ", 100_000, 1)).await.unwrap();
        let remaining = cart.add_item(line(b, "گلستان", 45_000, 1)).await.unwrap();

        f.backend.fail_writes_after(Table::Orders, 1);
        let err = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap_err();

        let CheckoutError::Partial { placed, .. } = err else {
            panic!("expected partial failure, got {err:?}");
        };
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].store_id, a);
        assert_eq!(cart.items(), &[remaining]);
        assert_eq!(f.backend.rows(Table::Orders).len(), 1);
    }

    #[tokio::test]
    async fn test_first_group_failure_changes_nothing() {
        let f = fixture();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();
        cart.add_item(line(f.stores[0].0, "گل سرخ", 100_000, 1)).await.unwrap();

        f.backend.fail_writes(Table::Orders);
        let err = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::Repository(_)));
        assert_eq!(cart.items().len(), 1);
    }

    #[tokio::test]
    async fn test_items_failure_removes_order_and_retry_places_one() {
        let f = fixture();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();
        cart.add_item(line(f.stores[0].0, "گل سرخ", 100_000, 1)).await.unwrap();

        f.backend.fail_writes(Table::OrderItems);
        let err = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::Repository(_)));
        assert!(f.backend.rows(Table::Orders).is_empty());
        assert_eq!(cart.items().len(), 1);

        f.backend.heal(Table::OrderItems);
        let orders = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(f.backend.rows(Table::Orders).len(), 1);
        assert_eq!(f.backend.rows(Table::OrderItems).len(), 1);
    }

    #[tokio::test]
    async fn test_cart_clear_failure_still_returns_orders() {
        let f = fixture();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();
        cart.add_item(line(f.stores[0].0, "گل سرخ", 100_000, 1)).await.unwrap();

        f.backend.fail_writes(Table::CartItems);
        let orders = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(f.backend.rows(Table::Orders).len(), 1);
    }

    #[tokio::test]
    async fn test_owner_of_inactive_store_is_notified() {
        let f = fixture();
        let owner = f.backend.seed_user("closed@example.ir", "secret1", "بسته", &[]);
        let store = f.backend.insert_row(
            Table::Stores,
            json!({ "name": "گل بسته", "owner_id": owner, "is_active": false }),
        );
        let store_id: StoreId = serde_json::from_value(store["id"].clone()).unwrap();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();
        cart.add_item(line(store_id, "گل بسته", 50_000, 1)).await.unwrap();

        place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap();
        let notifications = f.backend.rows(Table::Notifications);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["user_id"], json!(owner));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_order() {
        let f = fixture();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();
        cart.add_item(line(f.stores[0].0, "گل سرخ", 100_000, 1)).await.unwrap();

        f.backend.fail_writes(Table::Notifications);
        let orders = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap();
        assert_eq!(orders.len(), 1);
        assert!(f.backend.rows(Table::Notifications).is_empty());
    }

    #[tokio::test]
    async fn test_rejects_before_writing() {
        let f = fixture();
        let session = session();
        let mut cart = open_cart(&session, Some(&f.user), &f.backend).await.unwrap();

        let err = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        cart.add_item(line(f.stores[0].0, "گل سرخ", 100_000, 1)).await.unwrap();
        let err = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: AddressId::random(), notes: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::AddressNotFound));

        let long_notes = "ب".repeat(501);
        let err = place_orders(
            &mut cart,
            &f.user,
            &f.backend,
            CheckoutRequest { address_id: f.address, notes: Some(&long_notes) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert!(f.backend.rows(Table::Orders).is_empty());
    }
}
