//! Cart service.
//!
//! A cart lives in one of two places:
//!
//! - **Guest** ([`SessionCartStore`]): a JSON array in the visitor's session
//!   under `guest_cart` (lines written by older versions under `cart` are
//!   migrated on first load)
//! - **Signed in** ([`RemoteCartStore`]): rows of the backend's `cart_items`
//!   table, one per (user, product)
//!
//! [`open_cart`] picks the store from session state. [`Cart`] applies the
//! quantity rules and only changes its in-memory lines after the store has
//! accepted the write, so a failed call leaves the cart exactly as it was.
//!
//! On sign-in, [`merge_guest_cart`] folds the guest lines into the remote
//! cart before the remote cart is loaded.

use async_trait::async_trait;
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use golzar_core::{CartItemId, Price, ProductId, StoreId, UserId};

use crate::backend::DataApi;
use crate::db::{CartItemRepository, CatalogRepository, DataScope, RepositoryError};
use crate::models::session::keys;
use crate::models::{CartItem, CurrentUser, NewCartItem, ProductWithStore};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product has no stock left.
    #[error("product is out of stock")]
    OutOfStock,

    /// No line with the given ID in this cart.
    #[error("cart line not found")]
    ItemNotFound,

    /// Session storage failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The product's stock changed while it was being reserved.
    #[error("product stock changed during reservation")]
    StockChanged,

    /// The stock reservation could not be written; stock is unchanged.
    #[error("stock reservation failed: {0}")]
    Reservation(#[source] RepositoryError),

    /// Backend storage failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Where cart lines are persisted.
///
/// Write methods receive both the affected line and the complete set of
/// lines the cart will hold afterwards; each store persists whichever it
/// needs.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Load every line.
    async fn load(&self) -> Result<Vec<CartItem>, CartError>;

    /// Persist a new line; returns the line as stored.
    async fn insert_line(&self, line: &CartItem, next: &[CartItem]) -> Result<CartItem, CartError>;

    /// Persist a quantity change; returns the line as stored.
    async fn update_line(&self, line: &CartItem, next: &[CartItem]) -> Result<CartItem, CartError>;

    /// Remove lines.
    async fn remove_lines(&self, ids: &[CartItemId], next: &[CartItem]) -> Result<(), CartError>;

    /// Remove every line.
    async fn clear(&self) -> Result<(), CartError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Guest cart (session)
// ─────────────────────────────────────────────────────────────────────────────

/// Guest cart kept in the visitor's session.
pub struct SessionCartStore<'a> {
    session: &'a Session,
}

impl<'a> SessionCartStore<'a> {
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    async fn write(&self, items: &[CartItem]) -> Result<(), CartError> {
        self.session.insert(keys::GUEST_CART, items).await?;
        Ok(())
    }

    /// Read a key holding a line array; unreadable data counts as empty.
    async fn read_key(&self, key: &str) -> Result<Option<Vec<CartItem>>, CartError> {
        match self.session.get::<Vec<CartItem>>(key).await {
            Ok(items) => Ok(items),
            Err(tower_sessions::session::Error::SerdeJson(e)) => {
                tracing::warn!(key, error = %e, "Discarding unreadable guest cart");
                self.session.remove_value(key).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CartStore for SessionCartStore<'_> {
    async fn load(&self) -> Result<Vec<CartItem>, CartError> {
        if let Some(items) = self.read_key(keys::GUEST_CART).await? {
            return Ok(items);
        }

        let Some(legacy) = self.read_key(keys::LEGACY_CART).await? else {
            return Ok(Vec::new());
        };
        tracing::info!(lines = legacy.len(), "Migrating legacy guest cart");
        self.write(&legacy).await?;
        self.session.remove_value(keys::LEGACY_CART).await?;
        Ok(legacy)
    }

    async fn insert_line(&self, line: &CartItem, next: &[CartItem]) -> Result<CartItem, CartError> {
        self.write(next).await?;
        Ok(line.clone())
    }

    async fn update_line(&self, line: &CartItem, next: &[CartItem]) -> Result<CartItem, CartError> {
        self.write(next).await?;
        Ok(line.clone())
    }

    async fn remove_lines(&self, _ids: &[CartItemId], next: &[CartItem]) -> Result<(), CartError> {
        self.write(next).await
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.session.remove_value(keys::GUEST_CART).await?;
        self.session.remove_value(keys::LEGACY_CART).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signed-in cart (backend)
// ─────────────────────────────────────────────────────────────────────────────

/// Signed-in cart kept in the backend's `cart_items` table.
pub struct RemoteCartStore<'a> {
    repo: CartItemRepository<'a>,
    user: UserId,
}

impl<'a> RemoteCartStore<'a> {
    #[must_use]
    pub const fn new(scope: DataScope<'a>, user: UserId) -> Self {
        Self {
            repo: CartItemRepository::new(scope),
            user,
        }
    }
}

#[async_trait]
impl CartStore for RemoteCartStore<'_> {
    async fn load(&self) -> Result<Vec<CartItem>, CartError> {
        let rows = self.repo.list_for_user(self.user).await?;
        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    async fn insert_line(&self, line: &CartItem, _next: &[CartItem]) -> Result<CartItem, CartError> {
        Ok(self.repo.insert(self.user, line).await?.into())
    }

    async fn update_line(&self, line: &CartItem, _next: &[CartItem]) -> Result<CartItem, CartError> {
        let row = self
            .repo
            .set_quantity(self.user, line.id, line.quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ItemNotFound,
                other => other.into(),
            })?;
        Ok(row.into())
    }

    async fn remove_lines(&self, ids: &[CartItemId], _next: &[CartItem]) -> Result<(), CartError> {
        match ids {
            [id] => self.repo.delete(self.user, *id).await?,
            ids => self.repo.delete_many(self.user, ids).await?,
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.repo.delete_all(self.user).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cart
// ─────────────────────────────────────────────────────────────────────────────

/// Clamp a requested quantity into `[1, max(max_stock, 1)]`.
#[must_use]
pub fn clamp_quantity(requested: i64, max_stock: u32) -> u32 {
    let ceiling = i64::from(max_stock.max(1));
    // Bounded by `ceiling`, which came from a u32.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamped = requested.clamp(1, ceiling) as u32;
    clamped
}

/// Lines of one store, in cart order.
#[derive(Debug, Clone)]
pub struct StoreGroup<'c> {
    pub store_id: StoreId,
    pub store_name: &'c str,
    pub items: Vec<&'c CartItem>,
}

impl StoreGroup<'_> {
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(|item| item.line_total()).sum()
    }
}

/// A loaded cart bound to its store.
pub struct Cart<'a> {
    items: Vec<CartItem>,
    store: Box<dyn CartStore + 'a>,
}

impl std::fmt::Debug for Cart<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart").field("items", &self.items).finish_non_exhaustive()
    }
}

impl<'a> Cart<'a> {
    /// Load a cart from `store`.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the store cannot be read.
    pub async fn load(store: Box<dyn CartStore + 'a>) -> Result<Self, CartError> {
        let items = store.load().await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to load cart");
        })?;
        Ok(Self { items, store })
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of `price × quantity`.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Lines grouped by store, groups in order of first appearance.
    #[must_use]
    pub fn group_by_store(&self) -> Vec<StoreGroup<'_>> {
        let mut groups: Vec<StoreGroup<'_>> = Vec::new();
        for item in &self.items {
            match groups.iter_mut().find(|g| g.store_id == item.store_id) {
                Some(group) => group.items.push(item),
                None => groups.push(StoreGroup {
                    store_id: item.store_id,
                    store_name: &item.store_name,
                    items: vec![item],
                }),
            }
        }
        groups
    }

    /// Add a product.
    ///
    /// An existing line for the product grows to
    /// `min(existing + requested, max_stock)`; a new line starts at
    /// `min(requested, max_stock)`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::OutOfStock` for a new line with no stock, or the
    /// store's error if the write fails.
    #[instrument(skip(self, new), fields(product_id = %new.product_id))]
    pub async fn add_item(&mut self, new: NewCartItem) -> Result<CartItem, CartError> {
        let requested = new.requested_quantity();

        if let Some(existing) = self.items.iter().find(|i| i.product_id == new.product_id) {
            let mut line = existing.clone();
            line.quantity = clamp_quantity(
                i64::from(existing.quantity) + i64::from(requested),
                existing.max_stock,
            );
            return self.commit_update(line).await;
        }

        if new.max_stock == 0 {
            return Err(CartError::OutOfStock);
        }
        let quantity = requested.min(new.max_stock);
        let line = new.into_item(CartItemId::random(), quantity);

        let mut next = self.items.clone();
        next.push(line.clone());
        let stored = self
            .store
            .insert_line(&line, &next)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to add cart line"))?;

        self.items.push(stored.clone());
        Ok(stored)
    }

    /// The line holding `product`, if any.
    #[must_use]
    pub fn line_for_product(&self, product: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product)
    }

    /// Set a line's quantity, clamped into `[1, max_stock]`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` for an unknown line, or the store's
    /// error if the write fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(&mut self, id: CartItemId, quantity: i64) -> Result<CartItem, CartError> {
        let mut line = self.line(id)?.clone();
        line.quantity = clamp_quantity(quantity, line.max_stock);
        self.commit_update(line).await
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` for an unknown line, or the store's
    /// error if the write fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&mut self, id: CartItemId) -> Result<(), CartError> {
        self.line(id)?;
        self.remove_items(&[id]).await
    }

    /// Remove several lines; unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub async fn remove_items(&mut self, ids: &[CartItemId]) -> Result<(), CartError> {
        let next: Vec<CartItem> = self
            .items
            .iter()
            .filter(|item| !ids.contains(&item.id))
            .cloned()
            .collect();
        if next.len() == self.items.len() {
            return Ok(());
        }
        self.store
            .remove_lines(ids, &next)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to remove cart lines"))?;
        self.items = next;
        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.store
            .clear()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to clear cart"))?;
        self.items.clear();
        Ok(())
    }

    fn line(&self, id: CartItemId) -> Result<&CartItem, CartError> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .ok_or(CartError::ItemNotFound)
    }

    /// Replace the line with `line.id` once the store accepts the change.
    async fn commit_update(&mut self, line: CartItem) -> Result<CartItem, CartError> {
        let next: Vec<CartItem> = self
            .items
            .iter()
            .map(|item| if item.id == line.id { line.clone() } else { item.clone() })
            .collect();
        let stored = self
            .store
            .update_line(&line, &next)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to update cart line"))?;
        if let Some(item) = self.items.iter_mut().find(|item| item.id == line.id) {
            *item = stored.clone();
        }
        Ok(stored)
    }
}

/// Add a catalog product to the cart, taking the added quantity out of the
/// product's stock first.
///
/// The reservation is a compare-and-set on `products.stock`, so stock never
/// goes below zero. The new line's `max_stock` is the stock seen before the
/// reservation: what this cart holds plus what is left. If the cart write
/// fails afterwards the reservation is handed back.
///
/// # Errors
///
/// - `CartError::OutOfStock` when the product has no stock left
/// - `CartError::StockChanged` when another reservation got in first
/// - `CartError::Reservation` when the stock write fails
/// - the cart store's error when the line cannot be saved
#[instrument(skip(cart, catalog, product), fields(product_id = %product.product.id))]
pub async fn add_product(
    cart: &mut Cart<'_>,
    catalog: &CatalogRepository<'_>,
    product: ProductWithStore,
    requested: Option<u32>,
) -> Result<CartItem, CartError> {
    let stock = product.product.stock;
    if stock == 0 {
        return Err(CartError::OutOfStock);
    }

    let store_name = product.store_name().to_string();
    let product = product.product;
    let new = NewCartItem {
        product_id: product.id,
        name: product.name,
        price: product.price,
        image_url: product.image_url,
        store_id: product.store_id,
        store_name,
        max_stock: stock,
        quantity: requested,
    };

    let requested = new.requested_quantity();
    let added = match cart.line_for_product(product.id) {
        Some(line) => clamp_quantity(
            i64::from(line.quantity) + i64::from(requested),
            line.max_stock,
        )
        .saturating_sub(line.quantity)
        .min(stock),
        None => requested.min(stock),
    };
    if added == 0 {
        // Already at the line's ceiling; nothing to reserve.
        return cart
            .line_for_product(product.id)
            .cloned()
            .ok_or(CartError::OutOfStock);
    }

    let remaining = stock - added;
    catalog
        .swap_stock(product.id, stock, remaining)
        .await
        .map_err(CartError::Reservation)?
        .ok_or(CartError::StockChanged)?;

    let new = NewCartItem {
        quantity: Some(added),
        ..new
    };
    match cart.add_item(new).await {
        Ok(line) => {
            tracing::info!(product_id = %product.id, reserved = added, remaining, "Stock reserved");
            Ok(line)
        }
        Err(e) => {
            match catalog.swap_stock(product.id, remaining, stock).await {
                Ok(Some(_)) => {}
                Ok(None) => tracing::error!(product_id = %product.id, added, "Stock moved before reservation release"),
                Err(release_err) => {
                    tracing::error!(product_id = %product.id, added, error = %release_err, "Failed to release stock reservation");
                }
            }
            Err(e)
        }
    }
}

/// Open the cart for the current session: the remote cart when signed in,
/// the guest cart otherwise.
///
/// # Errors
///
/// Returns `CartError` if the selected store cannot be read.
pub async fn open_cart<'a>(
    session: &'a Session,
    user: Option<&'a CurrentUser>,
    api: &'a dyn DataApi,
) -> Result<Cart<'a>, CartError> {
    let store: Box<dyn CartStore + 'a> = match user {
        Some(user) => Box::new(RemoteCartStore::new(
            DataScope::authenticated(api, &user.access_token),
            user.id,
        )),
        None => Box::new(SessionCartStore::new(session)),
    };
    Cart::load(store).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge on sign-in
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of [`merge_guest_cart`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Guest lines now reflected in the remote cart.
    pub merged: usize,
    /// Guest lines that could not be written; they stay in the session.
    pub failed: usize,
}

/// Fold the guest cart into the signed-in user's remote cart.
///
/// Each guest line is upserted on (user, product) with quantity
/// `min(remote + guest, max_stock)`. Lines written successfully are removed
/// from the session; lines that failed stay there and are retried on the
/// next sign-in.
///
/// # Errors
///
/// Returns `CartError` only if the guest cart itself cannot be read or
/// rewritten; per-line backend failures are logged and counted.
#[instrument(skip(session, user, api), fields(user_id = %user.id))]
pub async fn merge_guest_cart(
    session: &Session,
    user: &CurrentUser,
    api: &dyn DataApi,
) -> Result<MergeReport, CartError> {
    let guest = SessionCartStore::new(session);
    let lines = guest.load().await?;
    if lines.is_empty() {
        return Ok(MergeReport::default());
    }

    let repo = CartItemRepository::new(DataScope::authenticated(api, &user.access_token));
    let mut report = MergeReport::default();
    let mut remaining = Vec::new();

    for line in lines {
        match merge_line(&repo, user.id, &line).await {
            Ok(()) => report.merged += 1,
            Err(e) => {
                tracing::warn!(product_id = %line.product_id, error = %e, "Failed to merge guest cart line");
                report.failed += 1;
                remaining.push(line);
            }
        }
    }

    if remaining.is_empty() {
        guest.clear().await?;
    } else {
        guest.write(&remaining).await?;
    }

    tracing::info!(merged = report.merged, failed = report.failed, "Merged guest cart");
    Ok(report)
}

async fn merge_line(
    repo: &CartItemRepository<'_>,
    user: UserId,
    line: &CartItem,
) -> Result<(), RepositoryError> {
    let existing = repo.find(user, line.product_id).await?;
    let remote_quantity = existing.as_ref().map_or(0, |row| row.quantity);
    let mut merged = line.clone();
    merged.quantity = clamp_quantity(
        i64::from(remote_quantity) + i64::from(line.quantity),
        line.max_stock,
    );
    repo.upsert(user, &merged).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use golzar_core::{Email, ProductId, RoleSet};
    use serde_json::json;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::{Query, Table};

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn rose(store_id: StoreId) -> NewCartItem {
        NewCartItem {
            product_id: ProductId::random(),
            name: "رز".to_string(),
            price: Price::from_toman(100_000),
            image_url: None,
            store_id,
            store_name: "گل سرخ".to_string(),
            max_stock: 5,
            quantity: Some(2),
        }
    }

    fn user(backend: &MemoryBackend) -> CurrentUser {
        let id = backend.seed_user("mina@example.ir", "secret1", "مینا", &[]);
        CurrentUser {
            id,
            email: Email::parse("mina@example.ir").unwrap(),
            full_name: None,
            roles: RoleSet::empty(),
            access_token: backend.access_token_for(id),
            refresh_token: String::new(),
        }
    }

    async fn catalog_product(backend: &MemoryBackend, id: ProductId) -> ProductWithStore {
        CatalogRepository::new(DataScope::anonymous(backend))
            .available_product(id)
            .await
            .unwrap()
            .unwrap()
    }

    fn seed_product(backend: &MemoryBackend, stock: u32) -> ProductId {
        let owner = backend.seed_user("rose@example.ir", "secret1", "فروشنده", &[]);
        let store = backend.insert_row(Table::Stores, json!({"name": "گل سرخ", "owner_id": owner}));
        let product = backend.insert_row(
            Table::Products,
            json!({"name": "رز", "price": "100000", "stock": stock, "store_id": store["id"]}),
        );
        serde_json::from_value(product["id"].clone()).unwrap()
    }

    fn stock_of(backend: &MemoryBackend, id: ProductId) -> u64 {
        backend
            .rows(Table::Products)
            .iter()
            .find(|row| row["id"] == json!(id))
            .and_then(|row| row["stock"].as_u64())
            .unwrap()
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(10, 5), 5);
        assert_eq!(clamp_quantity(0, 5), 1);
        assert_eq!(clamp_quantity(-3, 5), 1);
        assert_eq!(clamp_quantity(3, 5), 3);
        assert_eq!(clamp_quantity(4, 0), 1);
        assert_eq!(clamp_quantity(i64::MAX, u32::MAX), u32::MAX);
    }

    #[tokio::test]
    async fn test_rose_scenario_in_guest_cart() {
        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        let new = rose(StoreId::random());

        let line = cart.add_item(new.clone()).await.unwrap();
        assert_eq!(line.quantity, 2);

        let line = cart.update_quantity(line.id, 10).await.unwrap();
        assert_eq!(line.quantity, 5);

        let line = cart
            .add_item(NewCartItem { quantity: Some(1), ..new })
            .await
            .unwrap();
        assert_eq!(line.quantity, 5);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_price(), Price::from_toman(500_000));
    }

    #[tokio::test]
    async fn test_guest_cart_persists_in_session() {
        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        cart.add_item(rose(StoreId::random())).await.unwrap();

        let reloaded = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        assert_eq!(reloaded.items(), cart.items());
        assert_eq!(reloaded.total_items(), 2);
    }

    #[tokio::test]
    async fn test_new_line_clamped_and_out_of_stock_rejected() {
        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();

        let mut many = rose(StoreId::random());
        many.quantity = Some(50);
        assert_eq!(cart.add_item(many).await.unwrap().quantity, 5);

        let mut sold_out = rose(StoreId::random());
        sold_out.max_stock = 0;
        assert!(matches!(cart.add_item(sold_out).await, Err(CartError::OutOfStock)));
        assert_eq!(cart.items().len(), 1);
    }

    #[tokio::test]
    async fn test_add_product_reserves_stock() {
        let backend = MemoryBackend::new();
        let id = seed_product(&backend, 5);
        let catalog = CatalogRepository::new(DataScope::anonymous(&backend));
        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();

        let line = add_product(&mut cart, &catalog, catalog_product(&backend, id).await, Some(2))
            .await
            .unwrap();
        assert_eq!((line.quantity, line.max_stock), (2, 5));
        assert_eq!(line.store_name, "گل سرخ");
        assert_eq!(stock_of(&backend, id), 3);

        let line = add_product(&mut cart, &catalog, catalog_product(&backend, id).await, Some(9))
            .await
            .unwrap();
        assert_eq!(line.quantity, 5);
        assert_eq!(stock_of(&backend, id), 0);

        let err = add_product(&mut cart, &catalog, catalog_product(&backend, id).await, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::OutOfStock));
        assert_eq!(cart.total_items(), 5);
    }

    #[tokio::test]
    async fn test_add_product_keeps_stock_when_reservation_fails() {
        let backend = MemoryBackend::new();
        let id = seed_product(&backend, 5);
        let catalog = CatalogRepository::new(DataScope::anonymous(&backend));
        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();

        backend.fail_writes(Table::Products);
        let err = add_product(&mut cart, &catalog, catalog_product(&backend, id).await, Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Reservation(_)));
        assert!(cart.is_empty());
        assert_eq!(stock_of(&backend, id), 5);
    }

    #[tokio::test]
    async fn test_add_product_with_stale_stock_is_rejected() {
        let backend = MemoryBackend::new();
        let id = seed_product(&backend, 5);
        let catalog = CatalogRepository::new(DataScope::anonymous(&backend));
        let stale = catalog_product(&backend, id).await;
        backend
            .update(None, Table::Products, &Query::new().eq("id", id), json!({"stock": 4}))
            .await
            .unwrap();

        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        let err = add_product(&mut cart, &catalog, stale, Some(1)).await.unwrap_err();
        assert!(matches!(err, CartError::StockChanged));
        assert!(cart.is_empty());
        assert_eq!(stock_of(&backend, id), 4);
    }

    #[tokio::test]
    async fn test_add_product_releases_stock_when_cart_write_fails() {
        let backend = MemoryBackend::new();
        let id = seed_product(&backend, 5);
        let user = user(&backend);
        let catalog = CatalogRepository::new(DataScope::authenticated(&backend, &user.access_token));
        let session = session();
        let mut cart = open_cart(&session, Some(&user), &backend).await.unwrap();

        backend.fail_writes(Table::CartItems);
        let err = add_product(&mut cart, &catalog, catalog_product(&backend, id).await, Some(3))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Repository(_)));
        assert!(cart.is_empty());
        assert_eq!(stock_of(&backend, id), 5);
    }

    #[tokio::test]
    async fn test_empty_cart_totals() {
        let session = session();
        let cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        assert_eq!(cart.total_price(), Price::ZERO);
        assert_eq!(cart.total_items(), 0);
        assert!(cart.group_by_store().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        let first = cart.add_item(rose(StoreId::random())).await.unwrap();
        cart.add_item(rose(StoreId::random())).await.unwrap();

        cart.remove_item(first.id).await.unwrap();
        assert_eq!(cart.items().len(), 1);
        assert!(matches!(cart.remove_item(first.id).await, Err(CartError::ItemNotFound)));

        cart.clear().await.unwrap();
        let reloaded = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_group_by_store_keeps_first_appearance_order() {
        let session = session();
        let mut cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        let (a, b) = (StoreId::random(), StoreId::random());
        cart.add_item(rose(b)).await.unwrap();
        cart.add_item(rose(a)).await.unwrap();
        cart.add_item(rose(b)).await.unwrap();

        let groups = cart.group_by_store();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].store_id, b);
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].total(), Price::from_toman(400_000));
        assert_eq!(groups[1].store_id, a);
    }

    #[tokio::test]
    async fn test_legacy_key_migrates_to_guest_key() {
        let session = session();
        let line = rose(StoreId::random()).into_item(CartItemId::random(), 1);
        session.insert(keys::LEGACY_CART, vec![line.clone()]).await.unwrap();

        let cart = Cart::load(Box::new(SessionCartStore::new(&session))).await.unwrap();
        assert_eq!(cart.items(), &[line]);
        assert!(session.get::<Vec<CartItem>>(keys::LEGACY_CART).await.unwrap().is_none());
        assert!(session.get::<Vec<CartItem>>(keys::GUEST_CART).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_state_unchanged() {
        let backend = MemoryBackend::new();
        let user = user(&backend);
        let store = RemoteCartStore::new(DataScope::authenticated(&backend, &user.access_token), user.id);
        let mut cart = Cart::load(Box::new(store)).await.unwrap();
        let line = cart.add_item(rose(StoreId::random())).await.unwrap();

        backend.fail_writes(Table::CartItems);
        assert!(cart.update_quantity(line.id, 4).await.is_err());
        assert!(cart.add_item(rose(StoreId::random())).await.is_err());
        assert!(cart.clear().await.is_err());

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(backend.rows(Table::CartItems).len(), 1);
    }

    #[tokio::test]
    async fn test_open_cart_selects_store_by_session_state() {
        let backend = MemoryBackend::new();
        let user = user(&backend);
        let session = session();

        let mut guest = open_cart(&session, None, &backend).await.unwrap();
        guest.add_item(rose(StoreId::random())).await.unwrap();
        assert!(backend.rows(Table::CartItems).is_empty());

        let mut remote = open_cart(&session, Some(&user), &backend).await.unwrap();
        assert!(remote.is_empty());
        remote.add_item(rose(StoreId::random())).await.unwrap();
        assert_eq!(backend.rows(Table::CartItems).len(), 1);
    }

    #[tokio::test]
    async fn test_merge_sums_and_clamps_then_clears_guest_cart() {
        let backend = MemoryBackend::new();
        let user = user(&backend);
        let session = session();
        let store_id = StoreId::random();

        let shared = rose(store_id);
        let mut remote = open_cart(&session, Some(&user), &backend).await.unwrap();
        remote.add_item(shared.clone()).await.unwrap();

        let mut guest = open_cart(&session, None, &backend).await.unwrap();
        guest
            .add_item(NewCartItem { quantity: Some(4), ..shared.clone() })
            .await
            .unwrap();
        guest.add_item(rose(store_id)).await.unwrap();

        let report = merge_guest_cart(&session, &user, &backend).await.unwrap();
        assert_eq!(report, MergeReport { merged: 2, failed: 0 });

        let merged = open_cart(&session, Some(&user), &backend).await.unwrap();
        assert_eq!(merged.items().len(), 2);
        let line = merged
            .items()
            .iter()
            .find(|i| i.product_id == shared.product_id)
            .unwrap();
        assert_eq!(line.quantity, 5);

        let guest = open_cart(&session, None, &backend).await.unwrap();
        assert!(guest.is_empty());
    }

    #[tokio::test]
    async fn test_merge_keeps_failed_lines_for_next_sign_in() {
        let backend = MemoryBackend::new();
        let user = user(&backend);
        let session = session();

        let mut guest = open_cart(&session, None, &backend).await.unwrap();
        guest.add_item(rose(StoreId::random())).await.unwrap();
        guest.add_item(rose(StoreId::random())).await.unwrap();

        backend.fail_writes_after(Table::CartItems, 1);
        let report = merge_guest_cart(&session, &user, &backend).await.unwrap();
        assert_eq!(report, MergeReport { merged: 1, failed: 1 });

        let guest = open_cart(&session, None, &backend).await.unwrap();
        assert_eq!(guest.items().len(), 1);

        backend.heal(Table::CartItems);
        let report = merge_guest_cart(&session, &user, &backend).await.unwrap();
        assert_eq!(report, MergeReport { merged: 1, failed: 0 });
        assert_eq!(backend.rows(Table::CartItems).len(), 2);
    }

    #[tokio::test]
    async fn test_merge_with_empty_guest_cart_is_noop() {
        let backend = MemoryBackend::new();
        let user = user(&backend);
        let report = merge_guest_cart(&session(), &user, &backend).await.unwrap();
        assert_eq!(report, MergeReport::default());
    }
}
