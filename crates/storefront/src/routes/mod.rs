//! HTTP route handlers for storefront.
//!
//! Every endpoint speaks JSON. Errors use the body documented in
//! [`crate::error`].
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (backend reachable)
//!
//! # Auth (POSTs rate limited)
//! POST /auth/signup                     - Register
//! POST /auth/login                      - Sign in
//! POST /auth/logout                     - Sign out
//! GET  /auth/me                         - Signed-in user
//!
//! # Catalog
//! GET  /stores                          - Active stores
//! GET  /stores/{id}                     - Store with products
//! GET  /products?store=&q=              - Available products
//! GET  /products/{id}                   - Product with features
//!
//! # Cart and checkout (rate limited)
//! GET  /cart                            - Current cart
//! POST /cart/add                        - Add a product
//! POST /cart/update                     - Set a line's quantity
//! POST /cart/remove                     - Remove a line
//! POST /cart/clear                      - Empty the cart
//! POST /checkout                        - Place one order per store
//!
//! # Account (requires auth)
//! GET|PUT    /account/profile
//! GET|POST   /account/addresses
//! PUT|DELETE /account/addresses/{id}
//! GET        /account/orders
//! GET        /account/notifications
//! POST       /account/notifications/{id}/read
//!
//! # Seller (requires seller role)
//! GET|POST|PUT /seller/store
//! GET|POST     /seller/products
//! PUT|DELETE   /seller/products/{id}
//! GET|PUT      /seller/products/{id}/features
//! DELETE       /seller/features/{id}
//! GET          /seller/orders
//! POST         /seller/orders/{id}/status
//!
//! # Admin (requires admin role)
//! GET  /admin/dashboard
//! POST /admin/stores/{id}/toggle
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod seller;

use axum::{
    Router,
    extract::FromRequest,
    routing::{get, post, put},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// JSON request body. Malformed bodies answer with the standard error body
/// instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
        .route("/me", get(auth::me))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/stores", get(catalog::stores))
        .route("/stores/{id}", get(catalog::store))
        .route("/products", get(catalog::products))
        .route("/products/{id}", get(catalog::product))
}

/// Create the cart and checkout routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::show))
        .route("/cart/add", post(cart::add))
        .route("/cart/update", post(cart::update))
        .route("/cart/remove", post(cart::remove))
        .route("/cart/clear", post(cart::clear))
        .route("/checkout", post(checkout::checkout))
        .layer(api_rate_limiter())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).put(account::update_profile),
        )
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            put(account::update_address).delete(account::delete_address),
        )
        .route("/orders", get(account::orders))
        .route("/notifications", get(account::notifications))
        .route(
            "/notifications/{id}/read",
            post(account::mark_notification_read),
        )
}

/// Create the seller routes router.
pub fn seller_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/store",
            get(seller::store)
                .post(seller::create_store)
                .put(seller::update_store),
        )
        .route(
            "/products",
            get(seller::products).post(seller::create_product),
        )
        .route(
            "/products/{id}",
            put(seller::update_product).delete(seller::delete_product),
        )
        .route(
            "/products/{id}/features",
            get(seller::features).put(seller::save_features),
        )
        .route(
            "/features/{id}",
            axum::routing::delete(seller::delete_feature),
        )
        .route("/orders", get(seller::orders))
        .route("/orders/{id}/status", post(seller::change_order_status))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/stores/{id}/toggle", post(admin::toggle_store))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .merge(catalog_routes())
        .merge(cart_routes())
        .nest("/account", account_routes())
        .nest("/seller", seller_routes())
        .nest("/admin", admin_routes())
}

/// The complete application: routes plus the middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .merge(routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
