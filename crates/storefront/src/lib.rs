//! Golzar storefront library.
//!
//! The marketplace HTTP service as a library, so the binary stays thin and
//! the integration tests can drive the full router over an in-memory
//! backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;
