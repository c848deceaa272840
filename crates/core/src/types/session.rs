//! Session context passed into every cart operation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Which snapshot is authoritative for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Not logged in; the cart lives in local device storage.
    Guest,
    /// Logged in; the server owns the cart.
    Authenticated,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::Authenticated => f.write_str("authenticated"),
        }
    }
}

/// Session mode plus the user it belongs to.
///
/// A context is authenticated if and only if it carries a user id, so cart
/// code never has to handle "authenticated but anonymous".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    user_id: Option<UserId>,
}

impl SessionContext {
    /// A guest session.
    #[must_use]
    pub const fn guest() -> Self {
        Self { user_id: None }
    }

    /// An authenticated session for `user_id`.
    #[must_use]
    pub const fn authenticated(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// The session mode.
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        if self.user_id.is_some() {
            SessionMode::Authenticated
        } else {
            SessionMode::Guest
        }
    }

    /// The authenticated user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::guest()
    }
}

/// What setting a line's quantity to zero does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroQuantityPolicy {
    /// Drop the line from the cart.
    #[default]
    Remove,
    /// Keep the line with quantity 0 (legacy storefront behavior).
    Keep,
}

/// Error parsing a [`ZeroQuantityPolicy`] from configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown zero-quantity policy '{0}' (expected 'remove' or 'keep')")]
pub struct ParsePolicyError(String);

impl FromStr for ZeroQuantityPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove" => Ok(Self::Remove),
            "keep" => Ok(Self::Keep),
            other => Err(ParsePolicyError(other.to_owned())),
        }
    }
}
