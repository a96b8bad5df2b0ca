//! Domain models for the storefront.
//!
//! Row types mirror the backend's tables; embedded relations (`stores(name)`
//! and friends) appear as optional nested summaries.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod notification;
pub mod order;
pub mod session;

pub use account::{Address, Profile, ProfileWithRoles};
pub use cart::{CartItem, CartItemRow, NewCartItem};
pub use catalog::{Product, ProductFeature, ProductWithStore, Store, StoreSummary, StoreWithOwner};
pub use notification::Notification;
pub use order::{CustomerOrder, Order, OrderItem, StoreOrder};
pub use session::CurrentUser;
