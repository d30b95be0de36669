//! P2P permission state values
//!
//! The persisted form of each state is its uppercase name, so existing stores
//! written by earlier releases keep parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PermissionError;

/// The current P2P permission request state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionState {
    /// The user has not granted permission
    #[default]
    Denied,
    /// The user did not grant permission this time but will be asked next session
    TemporarilyDisabled,
    /// The user explicitly disabled or chose not to enable P2P
    Disabled,
    /// Permission is granted
    Allowed,
}

impl PermissionState {
    /// All states, in declaration order
    pub const ALL: [PermissionState; 4] = [
        Self::Denied,
        Self::TemporarilyDisabled,
        Self::Disabled,
        Self::Allowed,
    ];

    /// Return true if no further prompting is needed in this state
    pub fn is_terminal(self) -> bool {
        self != Self::Denied
    }

    /// Return true if P2P features may be used
    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }

    /// Name written to the preference store
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Denied => "DENIED",
            Self::TemporarilyDisabled => "TEMPORARILY_DISABLED",
            Self::Disabled => "DISABLED",
            Self::Allowed => "ALLOWED",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionState {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| PermissionError::CorruptState(s.to_string()))
    }
}
