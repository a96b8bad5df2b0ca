//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Email/password authentication and session identity
//! - `cart` - Guest and signed-in carts, merged on sign-in
//! - `checkout` - One order per store from the cart
//! - `account` - Profile, addresses, order history, notifications
//! - `seller` - A seller's store, products, features and incoming orders
//! - `admin` - Platform dashboard and store moderation

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod seller;
