//! Who is capturing.

use serde::{Deserialize, Serialize};

/// Display name used when a user has neither nickname nor username.
pub const UNKNOWN_USER_NAME: &str = "Unknown";

/// The authenticated user as seen by the capture client or the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl CurrentUser {
    /// Nickname, else username, else `"Unknown"`. Empty strings are skipped.
    pub fn display_name(&self) -> &str {
        [self.nickname.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_USER_NAME)
    }
}

/// Supplies the current user to a capture session.
pub trait CurrentUserProvider: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;
}

/// A fixed identity, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticUser(pub Option<CurrentUser>);

impl StaticUser {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self(Some(CurrentUser {
            id,
            nickname: Some(name.into()),
            username: None,
        }))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CurrentUserProvider for StaticUser {
    fn current_user(&self) -> Option<CurrentUser> {
        self.0.clone()
    }
}
