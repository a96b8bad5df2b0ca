//! Session-related types.
//!
//! Types stored in the session for authentication and guest cart state.

use serde::{Deserialize, Serialize};

use golzar_core::{Email, RoleSet, UserId};

/// Session-stored user identity.
///
/// Holds the backend access token so requests made on the user's behalf pass
/// row-level security. Implements `Debug` manually to redact the tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Auth provider user ID (also the profile ID).
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name from the profile, if set.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Roles looked up from `user_roles` when the session was established.
    #[serde(default)]
    pub roles: RoleSet,
    /// Bearer token for data API calls.
    pub access_token: String,
    /// Refresh token issued with the access token.
    pub refresh_token: String,
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("roles", &self.roles)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the active guest cart (JSON array of cart items).
    pub const GUEST_CART: &str = "guest_cart";

    /// Key used by earlier storefront versions for the guest cart.
    pub const LEGACY_CART: &str = "cart";
}
