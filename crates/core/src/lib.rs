//! Golzar Core - Shared domain types.
//!
//! This crate provides the types shared by every Golzar component:
//! - `storefront` - Marketplace web service (guests, buyers, sellers, admins)
//! - `integration-tests` - Black-box tests against the in-memory backend
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no backend access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, emails, phone numbers, roles and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
