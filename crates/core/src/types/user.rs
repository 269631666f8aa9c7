//! Authenticated user identity.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The authenticated user as reported by the backend's login endpoint.
///
/// Only `user_id` is needed to key cart and wishlist requests; the remaining
/// fields are for display and may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
}

impl CurrentUser {
    /// A user known only by ID.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            first_name: None,
            last_name: None,
            email: None,
            mobile_number: None,
        }
    }

    /// Name suitable for greetings, falling back to the email or ID.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !name.is_empty() {
            return name;
        }
        self.email
            .clone()
            .unwrap_or_else(|| format!("user #{}", self.user_id))
    }
}
