//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side failures to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Responses are JSON:
//!
//! ```json
//! { "error": "<message in the storefront language>", "fields": { "phone": "..." } }
//! ```
//!
//! `fields` is present only for validation failures. Internal details never
//! reach the client.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use golzar_core::OrderId;

use crate::backend::BackendError;
use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::seller::SellerError;
use crate::validation::FieldErrors;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend data operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Seller operation failed.
    #[error("Seller error: {0}")]
    Seller(#[from] SellerError),

    /// Submitted form failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] FieldErrors),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized")]
    Unauthorized,

    /// User lacks the required role.
    #[error("Forbidden")]
    Forbidden,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

const MSG_INTERNAL: &str = "خطای داخلی سرور";
const MSG_BACKEND: &str = "ارتباط با سرور برقرار نشد. دوباره تلاش کنید";
const MSG_NOT_FOUND: &str = "مورد درخواستی یافت نشد";
const MSG_CONFLICT: &str = "این مورد قبلاً ثبت شده است";
const MSG_UNAUTHORIZED: &str = "لطفا وارد حساب کاربری خود شوید";
const MSG_FORBIDDEN: &str = "شما به این بخش دسترسی ندارید";
const MSG_VALIDATION: &str = "اطلاعات وارد شده معتبر نیست";
const MSG_ORDER_FAILED: &str = "مشکلی در ثبت سفارش پیش آمد";

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    placed_orders: &'a [OrderId],
}

impl AppError {
    /// HTTP status and client-facing message.
    fn status_and_message(&self) -> (StatusCode, &str) {
        match self {
            Self::Repository(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "ایمیل یا رمز عبور اشتباه است")
                }
                AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "این ایمیل قبلاً ثبت شده است"),
                AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, MSG_UNAUTHORIZED),
                AuthError::Provider(_) => (StatusCode::BAD_GATEWAY, MSG_BACKEND),
                AuthError::Repository(err) => repository_status(err),
                AuthError::InvalidEmail(_) | AuthError::Session(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
                }
            },
            Self::Cart(err) => match err {
                CartError::OutOfStock => (StatusCode::CONFLICT, "موجودی این محصول به اتمام رسیده است"),
                CartError::StockChanged => {
                    (StatusCode::CONFLICT, "موجودی این محصول تغییر کرد، دوباره تلاش کنید")
                }
                CartError::Reservation(_) => {
                    (StatusCode::BAD_GATEWAY, "مشکلی در بروزرسانی موجودی پیش آمد")
                }
                CartError::ItemNotFound => (StatusCode::NOT_FOUND, "این کالا در سبد خرید نیست"),
                CartError::Repository(err) => repository_status(err),
                CartError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL),
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "سبد خرید شما خالی است"),
                CheckoutError::AddressNotFound => {
                    (StatusCode::BAD_REQUEST, "لطفا یک آدرس معتبر انتخاب کنید")
                }
                CheckoutError::Validation(_) => (StatusCode::BAD_REQUEST, MSG_VALIDATION),
                CheckoutError::Partial { source, .. } | CheckoutError::Repository(source) => {
                    (repository_status(source).0, MSG_ORDER_FAILED)
                }
            },
            Self::Seller(err) => match err {
                SellerError::NoStore => (StatusCode::NOT_FOUND, "ابتدا غرفه خود را ایجاد کنید"),
                SellerError::StoreExists => (StatusCode::CONFLICT, "شما قبلاً یک غرفه ایجاد کرده‌اید"),
                SellerError::NotFound => (StatusCode::NOT_FOUND, MSG_NOT_FOUND),
                SellerError::Repository(err) => repository_status(err),
            },
            Self::Validation(_) => (StatusCode::BAD_REQUEST, MSG_VALIDATION),
            Self::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, MSG_NOT_FOUND),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, MSG_UNAUTHORIZED),
            Self::Forbidden => (StatusCode::FORBIDDEN, MSG_FORBIDDEN),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.as_str()),
        }
    }

    fn fields(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(fields) | Self::Checkout(CheckoutError::Validation(fields)) => Some(fields),
            _ => None,
        }
    }

    fn placed_orders(&self) -> Vec<OrderId> {
        match self {
            Self::Checkout(CheckoutError::Partial { placed, .. }) => {
                placed.iter().map(|order| order.id).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> (StatusCode, &'static str) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, MSG_NOT_FOUND),
        RepositoryError::Conflict(_) => (StatusCode::CONFLICT, MSG_CONFLICT),
        RepositoryError::Backend(BackendError::Unauthorized(_)) => {
            (StatusCode::UNAUTHORIZED, MSG_UNAUTHORIZED)
        }
        RepositoryError::Backend(_) => (StatusCode::BAD_GATEWAY, MSG_BACKEND),
        RepositoryError::DataCorruption(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::BadRequest("بدنه درخواست نامعتبر است".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let placed_orders = self.placed_orders();
        let body = ErrorBody {
            error: message,
            fields: self.fields(),
            placed_orders: &placed_orders,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(RepositoryError::DataCorruption("x".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("dup".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::Backend(BackendError::Unavailable("down".into())).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(get_status(CartError::OutOfStock.into()), StatusCode::CONFLICT);
        assert_eq!(get_status(AuthError::UserAlreadyExists.into()), StatusCode::CONFLICT);
        assert_eq!(get_status(SellerError::NoStore.into()), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_error_body_has_fields() {
        let mut fields = FieldErrors::new();
        fields.add("phone", "شماره تلفن نامعتبر است");
        let (status, body) = render(AppError::Validation(fields)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MSG_VALIDATION);
        assert_eq!(body["fields"]["phone"], "شماره تلفن نامعتبر است");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = render(RepositoryError::DataCorruption("db password wrong".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], MSG_INTERNAL);
        assert!(body.get("fields").is_none());
        assert!(!body.to_string().contains("password"));
    }

    #[tokio::test]
    async fn test_invalid_credentials_message() {
        let (status, body) = render(AuthError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "ایمیل یا رمز عبور اشتباه است");
    }
}
