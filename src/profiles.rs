//! Profile store: one application profile per provider identity.
//!
//! Only keyed reads and the signup-time insert are exposed. The primary key
//! is the identity id, so a second insert for the same identity is rejected
//! by the store itself.

use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::AppError;
use crate::identity::Identity;

/// Stored profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub username: String,
}

impl Profile {
    /// The profile created for a fresh signup: both names start as the name
    /// the user typed.
    pub fn for_signup(identity_id: &str, name: &str) -> Self {
        Self {
            id: identity_id.to_string(),
            display_name: name.to_string(),
            username: name.to_string(),
        }
    }
}

/// The user-facing projection returned by login and profile reads: the
/// stored profile plus the email the provider holds for the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub email: String,
}

impl UserProfile {
    /// The only place a profile and an identity are merged. The id always
    /// comes from the profile row and the email always from the provider.
    pub fn from_parts(profile: Profile, identity: &Identity) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            username: profile.username,
            email: identity.email.clone(),
        }
    }
}

/// Fetch a profile by identity id.
pub fn get_profile(db: &Database, id: &str) -> Result<Option<Profile>, AppError> {
    let profile = db.with_conn(|conn| {
        conn.query_row(
            "SELECT id, display_name, username FROM profiles WHERE id = ?1",
            params![id],
            |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    username: row.get(2)?,
                })
            },
        )
        .optional()
    })?;
    Ok(profile)
}

/// Insert the profile for a newly created identity.
pub fn insert_profile(db: &Database, profile: &Profile) -> Result<(), AppError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO profiles (id, display_name, username) VALUES (?1, ?2, ?3)",
            params![profile.id, profile.display_name, profile.username],
        )
    })?;

    tracing::info!(profile_id = %profile.id, "Profile created");
    Ok(())
}
