//! Authentication extractors and session helpers.
//!
//! The signed-in user lives in the session under
//! [`keys::CURRENT_USER`](crate::models::session::keys::CURRENT_USER). Role
//! checks read the [`RoleSet`](golzar_core::RoleSet) stored there, which is
//! re-derived from `user_roles` on every sign-in and role refresh.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use golzar_core::Role;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::models::session::keys;

/// Extractor that requires a signed-in user.
///
/// Rejects with `401` and a JSON error body.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("سلام {}", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AppError::Unauthorized)?;

        current_user(session)
            .await?
            .map(Self)
            .ok_or(AppError::Unauthorized)
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Never rejects; an unreadable session counts as signed out.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => current_user(session).await.ok().flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// A role an endpoint requires.
pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: Role;
}

/// Marker for seller-only endpoints.
pub struct Seller;

impl RequiredRole for Seller {
    const ROLE: Role = Role::Seller;
}

/// Marker for admin-only endpoints.
pub struct Admin;

impl RequiredRole for Admin {
    const ROLE: Role = Role::Admin;
}

/// Extractor that requires a signed-in user holding role `R`.
///
/// Rejects with `401` when signed out and `403` when the role is missing.
pub struct RequireRole<R: RequiredRole>(pub CurrentUser, PhantomData<R>);

impl<R: RequiredRole> RequireRole<R> {
    /// The signed-in user.
    #[must_use]
    pub fn into_user(self) -> CurrentUser {
        self.0
    }
}

/// Seller-only extractor.
pub type RequireSeller = RequireRole<Seller>;

/// Admin-only extractor.
pub type RequireAdmin = RequireRole<Admin>;

impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    S: Send + Sync,
    R: RequiredRole,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.roles.contains(R::ROLE) {
            tracing::warn!(user_id = %user.id, required = %R::ROLE, "Role check failed");
            return Err(AppError::Forbidden);
        }
        Ok(Self(user, PhantomData))
    }
}

/// Read the signed-in user from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn current_user(
    session: &Session,
) -> Result<Option<CurrentUser>, tower_sessions::session::Error> {
    session.get(keys::CURRENT_USER).await
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_USER, user).await
}

/// Forget the signed-in user (sign-out).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove_value(keys::CURRENT_USER).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use golzar_core::{Email, RoleSet, UserId};
    use tower_sessions::MemoryStore;

    use super::*;

    fn user(roles: &[Role]) -> CurrentUser {
        CurrentUser {
            id: UserId::random(),
            email: Email::parse("mina@example.ir").unwrap(),
            full_name: None,
            roles: roles.iter().copied().collect::<RoleSet>(),
            access_token: "token".to_string(),
            refresh_token: String::new(),
        }
    }

    async fn parts_with(user: Option<&CurrentUser>) -> Parts {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        if let Some(user) = user {
            set_current_user(&session, user).await.unwrap();
        }
        let (mut parts, ()) = Request::new(()).into_parts();
        parts.extensions.insert(session);
        parts
    }

    #[tokio::test]
    async fn test_require_auth() {
        let mut parts = parts_with(None).await;
        let err = RequireAuth::from_request_parts(&mut parts, &()).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

        let signed_in = user(&[Role::Customer]);
        let mut parts = parts_with(Some(&signed_in)).await;
        let RequireAuth(found) = RequireAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found.id, signed_in.id);
    }

    #[tokio::test]
    async fn test_optional_auth_without_session_layer() {
        let (mut parts, ()) = Request::new(()).into_parts();
        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_role_requirements() {
        let customer = user(&[Role::Customer]);
        let mut parts = parts_with(Some(&customer)).await;
        let err = RequireSeller::from_request_parts(&mut parts, &()).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let seller = user(&[Role::Customer, Role::Seller]);
        let mut parts = parts_with(Some(&seller)).await;
        assert!(RequireSeller::from_request_parts(&mut parts, &()).await.is_ok());
        assert!(RequireAdmin::from_request_parts(&mut parts, &()).await.is_err());

        let mut parts = parts_with(None).await;
        let err = RequireAdmin::from_request_parts(&mut parts, &()).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_clear_current_user() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        set_current_user(&session, &user(&[])).await.unwrap();
        clear_current_user(&session).await.unwrap();
        assert!(current_user(&session).await.unwrap().is_none());
    }
}
