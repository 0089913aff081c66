//! Chat participant identity and role.
//!
//! An `Identity` is the opaque integer key a chat transport assigns to a
//! participant. It keys sessions, rate-limit windows, and answer records.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Opaque key for a chat participant.
///
/// Wraps the transport-assigned integer id. Never reused across distinct
/// real users; carries no meaning beyond being a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub i64);

impl Identity {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw transport id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Role of the requester, resolved once at the boundary.
///
/// Admins are listed in `EngineConfig::admin_ids`; everyone else is a
/// regular user. The role selects which rate-limit budget applies and
/// whether administrative commands are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}
