//! Auth provider response types.

use golzar_core::UserId;
use serde::{Deserialize, Serialize};

/// User identity returned by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Free-form metadata attached at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A session issued by the auth provider.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// The account is active and a session was issued.
    Session(AuthTokens),
    /// The account exists but the email address must be confirmed first.
    ConfirmationPending(AuthUser),
}

impl SignUpOutcome {
    /// The user behind either outcome.
    #[must_use]
    pub const fn user(&self) -> &AuthUser {
        match self {
            Self::Session(tokens) => &tokens.user,
            Self::ConfirmationPending(user) => user,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_debug_redacts() {
        let tokens: AuthTokens = serde_json::from_value(serde_json::json!({
            "access_token": "eyJ.secret.token",
            "refresh_token": "refresh-me",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {
                "id": "0f8fad5b-d9cb-469f-a165-70867728950e",
                "email": "mina@example.ir",
                "user_metadata": {"full_name": "مینا"}
            }
        }))
        .unwrap();

        let debug = format!("{tokens:?}");
        assert!(!debug.contains("eyJ.secret.token"));
        assert!(!debug.contains("refresh-me"));
        assert!(debug.contains("mina@example.ir"));
        assert_eq!(tokens.user.user_metadata.full_name.as_deref(), Some("مینا"));
    }

    #[test]
    fn test_user_metadata_defaults() {
        let user: AuthUser = serde_json::from_value(serde_json::json!({
            "id": "0f8fad5b-d9cb-469f-a165-70867728950e"
        }))
        .unwrap();
        assert!(user.email.is_none());
        assert!(user.user_metadata.full_name.is_none());
    }
}
