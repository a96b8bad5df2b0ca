//! Authentication service.
//!
//! Email/password authentication against the managed backend's auth API.
//! Every change of auth state (sign-up with a session, sign-in, role refresh)
//! re-derives the user's [`RoleSet`] from `user_roles` and stores a fresh
//! [`CurrentUser`] in the session. Signing in also folds the guest cart into
//! the user's remote cart, once per sign-in.

mod error;

pub use error::AuthError;

use tower_sessions::Session;
use tracing::instrument;

use golzar_core::{Email, RoleSet};

use crate::backend::{AuthApi, AuthTokens, DataApi, SignUpOutcome};
use crate::db::{DataScope, ProfileRepository};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::cart::merge_guest_cart;
use crate::validation::{ValidLogin, ValidSignup};

/// Result of a sign-up.
#[derive(Debug)]
pub enum SignUp {
    /// The account is active and the user is now signed in.
    SignedIn(CurrentUser),
    /// The account was created; the user must confirm their email first.
    ConfirmationPending(Email),
}

/// Authentication service.
pub struct AuthService<'a> {
    auth: &'a dyn AuthApi,
    data: &'a dyn DataApi,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(auth: &'a dyn AuthApi, data: &'a dyn DataApi) -> Self {
        Self { auth, data }
    }

    /// Register a new account.
    ///
    /// When the provider issues a session right away the user is signed in
    /// as by [`Self::sign_in`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is already
    /// registered, or another `AuthError` if a backend call fails.
    #[instrument(skip(self, session, form), fields(email = %form.email))]
    pub async fn sign_up(&self, session: &Session, form: ValidSignup) -> Result<SignUp, AuthError> {
        let outcome = self
            .auth
            .sign_up(&form.email, &form.password, &form.full_name)
            .await
            .map_err(AuthError::from)
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-up failed"))?;

        match outcome {
            SignUpOutcome::Session(tokens) => {
                let user = self.establish(session, tokens, &form.email).await?;
                Ok(SignUp::SignedIn(user))
            }
            SignUpOutcome::ConfirmationPending(_) => {
                tracing::info!("Sign-up awaiting email confirmation");
                Ok(SignUp::ConfirmationPending(form.email))
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email or password is
    /// wrong, or another `AuthError` if a backend call fails.
    #[instrument(skip(self, session, form), fields(email = %form.email))]
    pub async fn sign_in(&self, session: &Session, form: ValidLogin) -> Result<CurrentUser, AuthError> {
        let tokens = self
            .auth
            .sign_in_with_password(&form.email, &form.password)
            .await
            .map_err(AuthError::from)
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-in failed"))?;

        self.establish(session, tokens, &form.email).await
    }

    /// Sign out: revoke the token and forget the user.
    ///
    /// The session is cleared even if the provider cannot be reached.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session cannot be modified.
    #[instrument(skip(self, session, user), fields(user_id = %user.id))]
    pub async fn sign_out(&self, session: &Session, user: &CurrentUser) -> Result<(), AuthError> {
        if let Err(e) = self.auth.sign_out(&user.access_token).await {
            tracing::warn!(error = %e, "Failed to revoke session token");
        }
        clear_current_user(session).await?;
        session.cycle_id().await?;
        clear_sentry_user();
        tracing::info!("User signed out");
        Ok(())
    }

    /// Re-read the user's roles and store the updated user in the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the token is no longer valid,
    /// or another `AuthError` if a backend call fails.
    #[instrument(skip(self, session, user), fields(user_id = %user.id))]
    pub async fn refresh_roles(
        &self,
        session: &Session,
        mut user: CurrentUser,
    ) -> Result<CurrentUser, AuthError> {
        self.auth.get_user(&user.access_token).await?;
        user.roles = self.lookup_roles(&user).await?;
        set_current_user(session, &user).await?;
        Ok(user)
    }

    /// Build the session user from a fresh token, store it and merge the
    /// guest cart.
    async fn establish(
        &self,
        session: &Session,
        tokens: AuthTokens,
        fallback_email: &Email,
    ) -> Result<CurrentUser, AuthError> {
        let email = match tokens.user.email.as_deref() {
            Some(email) => Email::parse(email)?,
            None => fallback_email.clone(),
        };

        let mut user = CurrentUser {
            id: tokens.user.id,
            email,
            full_name: tokens.user.user_metadata.full_name.clone(),
            roles: RoleSet::empty(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        };

        let profiles = ProfileRepository::new(DataScope::authenticated(self.data, &user.access_token));
        if let Some(profile) = profiles.get(user.id).await?
            && profile.full_name.is_some()
        {
            user.full_name = profile.full_name;
        }
        user.roles = self.lookup_roles(&user).await?;

        session.cycle_id().await?;
        set_current_user(session, &user).await?;
        set_sentry_user(&user.id, Some(user.email.as_str()));

        match merge_guest_cart(session, &user, self.data).await {
            Ok(report) if report.failed > 0 => {
                tracing::warn!(failed = report.failed, "Some guest cart lines were not merged");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to merge guest cart"),
        }

        tracing::info!(user_id = %user.id, roles = ?user.roles, "User signed in");
        Ok(user)
    }

    async fn lookup_roles(&self, user: &CurrentUser) -> Result<RoleSet, AuthError> {
        let profiles = ProfileRepository::new(DataScope::authenticated(self.data, &user.access_token));
        Ok(profiles.roles(user.id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use golzar_core::{Price, ProductId, Role, StoreId};
    use secrecy::SecretString;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::backend::Table;
    use crate::backend::memory::MemoryBackend;
    use crate::middleware::current_user;
    use crate::models::NewCartItem;
    use crate::services::cart::open_cart;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn login(email: &str, password: &str) -> ValidLogin {
        ValidLogin {
            email: Email::parse(email).unwrap(),
            password: SecretString::from(password),
        }
    }

    fn signup(email: &str) -> ValidSignup {
        ValidSignup {
            full_name: "سارا رضایی".to_string(),
            email: Email::parse(email).unwrap(),
            password: SecretString::from("secret1"),
        }
    }

    #[tokio::test]
    async fn test_sign_in_loads_roles_and_stores_user() {
        let backend = MemoryBackend::new();
        backend.seed_user("seller@example.ir", "secret1", "فروشنده", &[Role::Seller]);
        let session = session();
        let service = AuthService::new(&backend, &backend);

        let user = service
            .sign_in(&session, login("seller@example.ir", "secret1"))
            .await
            .unwrap();
        assert!(user.roles.is_seller());
        assert_eq!(user.full_name.as_deref(), Some("فروشنده"));

        let stored = current_user(&session).await.unwrap().unwrap();
        assert_eq!(stored.id, user.id);
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password() {
        let backend = MemoryBackend::new();
        backend.seed_user("mina@example.ir", "secret1", "مینا", &[]);
        let service = AuthService::new(&backend, &backend);

        let err = service
            .sign_in(&session(), login("mina@example.ir", "wrong-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email() {
        let backend = MemoryBackend::new();
        backend.seed_user("mina@example.ir", "secret1", "مینا", &[]);
        let service = AuthService::new(&backend, &backend);

        let err = service
            .sign_up(&session(), signup("mina@example.ir"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_sign_up_signs_in_as_customer() {
        let backend = MemoryBackend::new();
        let session = session();
        let service = AuthService::new(&backend, &backend);

        let SignUp::SignedIn(user) = service.sign_up(&session, signup("new@example.ir")).await.unwrap() else {
            panic!("expected a session");
        };
        assert!(user.roles.is_customer());
        assert!(!user.roles.is_seller());
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_does_not_sign_in() {
        let backend = MemoryBackend::new();
        backend.require_email_confirmation(true);
        let session = session();
        let service = AuthService::new(&backend, &backend);

        let outcome = service.sign_up(&session, signup("new@example.ir")).await.unwrap();
        assert!(matches!(outcome, SignUp::ConfirmationPending(_)));
        assert!(current_user(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_merges_guest_cart() {
        let backend = MemoryBackend::new();
        backend.seed_user("mina@example.ir", "secret1", "مینا", &[]);
        let session = session();

        let mut guest = open_cart(&session, None, &backend).await.unwrap();
        guest
            .add_item(NewCartItem {
                product_id: ProductId::random(),
                name: "لاله".to_string(),
                price: Price::from_toman(45_000),
                image_url: None,
                store_id: StoreId::random(),
                store_name: "گلستان".to_string(),
                max_stock: 3,
                quantity: Some(2),
            })
            .await
            .unwrap();

        let service = AuthService::new(&backend, &backend);
        let user = service
            .sign_in(&session, login("mina@example.ir", "secret1"))
            .await
            .unwrap();

        assert_eq!(backend.rows(Table::CartItems).len(), 1);
        let cart = open_cart(&session, Some(&user), &backend).await.unwrap();
        assert_eq!(cart.total_items(), 2);
        assert!(open_cart(&session, None, &backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_roles_picks_up_new_grant() {
        let backend = MemoryBackend::new();
        let id = backend.seed_user("mina@example.ir", "secret1", "مینا", &[]);
        let session = session();
        let service = AuthService::new(&backend, &backend);
        let user = service
            .sign_in(&session, login("mina@example.ir", "secret1"))
            .await
            .unwrap();
        assert!(!user.roles.is_admin());

        backend.grant_role(id, Role::Admin);
        let user = service.refresh_roles(&session, user).await.unwrap();
        assert!(user.roles.is_admin());
        assert!(current_user(&session).await.unwrap().unwrap().roles.is_admin());
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let backend = MemoryBackend::new();
        backend.seed_user("mina@example.ir", "secret1", "مینا", &[]);
        let session = session();
        let service = AuthService::new(&backend, &backend);
        let user = service
            .sign_in(&session, login("mina@example.ir", "secret1"))
            .await
            .unwrap();

        service.sign_out(&session, &user).await.unwrap();
        assert!(current_user(&session).await.unwrap().is_none());

        let err = service.refresh_roles(&session, user).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
    }
}
