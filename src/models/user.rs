//! User profile snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Staff role shown as a badge on a profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmhand,
    Ranger,
}

impl Role {
    /// Map badge label text to a role. `Admin` counts as a ranger.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Farm Hand" => Some(Self::Farmhand),
            "Ranger" | "Admin" => Some(Self::Ranger),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Farmhand => "farmhand",
            Self::Ranger => "ranger",
        }
    }
}

/// The state of a user's profile at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSnapshot {
    pub user_id: u64,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub username: String,
    #[serde(default)]
    pub is_farmhand: bool,
    #[serde(default)]
    pub is_ranger: bool,
}

impl UserSnapshot {
    pub fn new(
        user_id: u64,
        timestamp: DateTime<Utc>,
        username: impl Into<String>,
        role: Option<Role>,
    ) -> Self {
        Self {
            user_id,
            timestamp,
            username: username.into(),
            is_farmhand: role == Some(Role::Farmhand),
            is_ranger: role == Some(Role::Ranger),
        }
    }

    /// Highest role flag set on this snapshot.
    pub fn role(&self) -> Option<Role> {
        if self.is_ranger {
            Some(Role::Ranger)
        } else if self.is_farmhand {
            Some(Role::Farmhand)
        } else {
            None
        }
    }

    /// Compare everything except the scrape timestamp.
    pub fn same_state(&self, other: &UserSnapshot) -> bool {
        self.user_id == other.user_id
            && self.username == other.username
            && self.is_farmhand == other.is_farmhand
            && self.is_ranger == other.is_ranger
    }
}
