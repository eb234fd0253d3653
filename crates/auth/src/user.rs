//! User identity records.
//!
//! Credentials arrive already hashed; hashing and verification belong to the
//! identity service, not to this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clubhouse_core::{DomainResult, Entity, UserId, validate};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A registered user.
///
/// # Invariants
/// - `email` is trimmed and lowercased (the store enforces uniqueness on it).
/// - Names are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub college: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command to register a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub credential_hash: String,
    pub college: Option<String>,
}

impl User {
    /// Validate a registration and build the user record.
    pub fn register(id: UserId, cmd: RegisterUser, now: DateTime<Utc>) -> DomainResult<Self> {
        let first_name = validate::required_text("first name", &cmd.first_name)?;
        let last_name = validate::required_text("last name", &cmd.last_name)?;
        let email = validate::email("email", &cmd.email)?;
        let credential_hash = validate::required_text("credential", &cmd.credential_hash)?;

        Ok(Self {
            id,
            first_name,
            last_name,
            email,
            credential_hash,
            college: validate::optional_text(cmd.college.as_deref()),
            created_at: now,
        })
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
