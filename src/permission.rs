use serde::{Deserialize, Serialize};
use std::fmt;

use crate::changeset::ChangeSet;

/// The only column a co-admin may write
pub const STATUS_COLUMN: &str = "STATUS";

/// Permission level of a user, as stored in the `USER_TYPE` column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Read,
    CoAdmin,
    Admin,
    Client,
    /// Any value not recognised above. Writes are not restricted for it.
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "read" => Role::Read,
            "co-admin" => Role::CoAdmin,
            "admin" => Role::Admin,
            "client" => Role::Client,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Read => "read",
            Role::CoAdmin => "co-admin",
            Role::Admin => "admin",
            Role::Client => "client",
            Role::Other(s) => s,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied(String),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

/// Decide whether `role` may apply `changes`
///
/// Runs on the raw column names supplied by the caller, before they are
/// resolved against the sheet header: a co-admin naming any column other
/// than `STATUS` is denied even if that column does not exist.
pub fn authorize(role: &Role, changes: &ChangeSet) -> Authorization {
    match role {
        Role::Read => Authorization::Denied("Permission denied".to_string()),
        Role::CoAdmin => {
            let touches_other = changes
                .values()
                .flat_map(|row| row.keys())
                .any(|column| column != STATUS_COLUMN);
            if touches_other {
                Authorization::Denied(format!(
                    "Co-admin can only modify {} column",
                    STATUS_COLUMN
                ))
            } else {
                Authorization::Allowed
            }
        }
        _ => Authorization::Allowed,
    }
}
