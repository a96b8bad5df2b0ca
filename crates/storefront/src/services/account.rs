//! Customer account: profile, delivery addresses, order history and
//! notifications.

use tracing::instrument;

use golzar_core::{AddressId, NotificationId, UserId};

use crate::backend::DataApi;
use crate::db::{
    AddressRepository, DataScope, NotificationRepository, OrderRepository, ProfileRepository,
    RepositoryError,
};
use crate::models::{Address, CurrentUser, CustomerOrder, Notification, Profile};
use crate::validation::{ValidAddress, ValidProfile};

/// Operations on the signed-in user's own account.
pub struct AccountService<'a> {
    scope: DataScope<'a>,
    user: UserId,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataApi, user: &'a CurrentUser) -> Self {
        Self {
            scope: DataScope::authenticated(api, user.access_token.as_str()),
            user: user.id,
        }
    }

    /// The user's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile row is missing.
    pub async fn profile(&self) -> Result<Profile, RepositoryError> {
        ProfileRepository::new(self.scope)
            .get(self.user)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    #[instrument(skip(self, profile), fields(user_id = %self.user))]
    pub async fn update_profile(&self, profile: &ValidProfile) -> Result<Profile, RepositoryError> {
        ProfileRepository::new(self.scope).update(self.user, profile).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Addresses
    // ─────────────────────────────────────────────────────────────────────────

    /// Addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn addresses(&self) -> Result<Vec<Address>, RepositoryError> {
        AddressRepository::new(self.scope).list_for_user(self.user).await
    }

    /// Add an address. A new default address unmarks the previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a backend call fails.
    #[instrument(skip(self, address), fields(user_id = %self.user))]
    pub async fn create_address(&self, address: &ValidAddress) -> Result<Address, RepositoryError> {
        let repo = AddressRepository::new(self.scope);
        if address.is_default {
            repo.clear_defaults(self.user).await?;
        }
        repo.insert(self.user, address).await
    }

    /// Replace an address. Marking it default unmarks the previous default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    #[instrument(skip(self, address), fields(user_id = %self.user))]
    pub async fn update_address(
        &self,
        id: AddressId,
        address: &ValidAddress,
    ) -> Result<Address, RepositoryError> {
        let repo = AddressRepository::new(self.scope);
        repo.get(self.user, id).await?.ok_or(RepositoryError::NotFound)?;
        if address.is_default {
            repo.clear_defaults(self.user).await?;
        }
        repo.update(self.user, id, address).await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    #[instrument(skip(self), fields(user_id = %self.user))]
    pub async fn delete_address(&self, id: AddressId) -> Result<(), RepositoryError> {
        AddressRepository::new(self.scope).delete(self.user, id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders and notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn orders(&self) -> Result<Vec<CustomerOrder>, RepositoryError> {
        OrderRepository::new(self.scope).for_customer(self.user).await
    }

    /// Notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn notifications(&self) -> Result<Vec<Notification>, RepositoryError> {
        NotificationRepository::new(self.scope).list_for_user(self.user).await
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend call fails.
    pub async fn unread_notifications(&self) -> Result<u64, RepositoryError> {
        NotificationRepository::new(self.scope).unread_count(self.user).await
    }

    /// Mark a notification read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification is not the user's.
    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<Notification, RepositoryError> {
        NotificationRepository::new(self.scope).mark_read(self.user, id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use golzar_core::{Email, NotificationKind, PhoneNumber, RoleSet};
    use serde_json::json;

    use super::*;
    use crate::backend::Table;
    use crate::backend::memory::MemoryBackend;

    fn signed_in(backend: &MemoryBackend, email: &str) -> CurrentUser {
        let id = backend.seed_user(email, "secret1", "مینا", &[]);
        CurrentUser {
            id,
            email: Email::parse(email).unwrap(),
            full_name: None,
            roles: RoleSet::empty(),
            access_token: backend.access_token_for(id),
            refresh_token: String::new(),
        }
    }

    fn address(title: &str, is_default: bool) -> ValidAddress {
        ValidAddress {
            title: title.to_string(),
            full_address: "اصفهان، خیابان چهارباغ، کوچه ۵".to_string(),
            phone: PhoneNumber::parse("09131234567").unwrap(),
            postal_code: None,
            is_default,
        }
    }

    #[tokio::test]
    async fn test_single_default_address() {
        let backend = MemoryBackend::new();
        let user = signed_in(&backend, "mina@example.ir");
        let account = AccountService::new(&backend, &user);

        let home = account.create_address(&address("خانه", true)).await.unwrap();
        let work = account.create_address(&address("محل کار", true)).await.unwrap();

        let list = account.addresses().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, work.id);
        assert!(list[0].is_default);
        assert!(!list[1].is_default);

        account.update_address(home.id, &address("خانه", true)).await.unwrap();
        let defaults: Vec<_> = account
            .addresses()
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, home.id);
    }

    #[tokio::test]
    async fn test_cannot_touch_other_users_address() {
        let backend = MemoryBackend::new();
        let owner = signed_in(&backend, "mina@example.ir");
        let other = signed_in(&backend, "sara@example.ir");
        let created = AccountService::new(&backend, &owner)
            .create_address(&address("خانه", false))
            .await
            .unwrap();

        let intruder = AccountService::new(&backend, &other);
        assert!(matches!(
            intruder.update_address(created.id, &address("x", false)).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            intruder.delete_address(created.id).await,
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(backend.rows(Table::Addresses).len(), 1);
    }

    #[tokio::test]
    async fn test_profile_update() {
        let backend = MemoryBackend::new();
        let user = signed_in(&backend, "mina@example.ir");
        let account = AccountService::new(&backend, &user);

        let updated = account
            .update_profile(&ValidProfile {
                full_name: "مینا احمدی".to_string(),
                phone: Some(PhoneNumber::parse("09121112233").unwrap()),
            })
            .await
            .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("مینا احمدی"));
        assert_eq!(account.profile().await.unwrap().phone.as_deref(), Some("09121112233"));
    }

    #[tokio::test]
    async fn test_notifications_mark_read() {
        let backend = MemoryBackend::new();
        let user = signed_in(&backend, "mina@example.ir");
        let row = backend.insert_row(
            Table::Notifications,
            json!({
                "user_id": user.id,
                "title": "تغییر وضعیت سفارش",
                "message": "سفارش شما ارسال شد",
                "type": NotificationKind::OrderStatus,
            }),
        );
        let account = AccountService::new(&backend, &user);
        assert_eq!(account.unread_notifications().await.unwrap(), 1);

        let id = serde_json::from_value(row["id"].clone()).unwrap();
        let read = account.mark_notification_read(id).await.unwrap();
        assert!(read.is_read);
        assert_eq!(account.unread_notifications().await.unwrap(), 0);
        assert_eq!(account.notifications().await.unwrap().len(), 1);
    }
}
