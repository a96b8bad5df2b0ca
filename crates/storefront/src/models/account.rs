//! Profiles and addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use golzar_core::{AddressId, Role, RoleSet, UserId};

/// Row of the `profiles` table (one per auth user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRow {
    pub role: Role,
}

/// A profile with its granted roles, for the admin view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileWithRoles {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default, rename = "user_roles")]
    pub role_rows: Vec<RoleRow>,
}

impl ProfileWithRoles {
    #[must_use]
    pub fn roles(&self) -> RoleSet {
        self.role_rows.iter().map(|r| r.role).collect()
    }
}

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub title: String,
    pub full_address: String,
    pub phone: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}
