//! Session-related types.
//!
//! The session stands in for the browser storage a single-page client would
//! use: it holds the signed-in user, the cart mirror and the chat session id.

use serde::{Deserialize, Serialize};

use shopfront_core::{UserId, UserRole};

/// Session-stored user identity.
///
/// Holds the bearer token issued by the user service, so `Debug` redacts it.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// Email address as the user service reports it.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Customer or admin.
    pub role: UserRole,
    /// Bearer token for backend calls made on the user's behalf.
    pub token: String,
}

impl CurrentUser {
    /// Whether the user may open the admin dashboard.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the cart mirror.
    pub const CART: &str = "cart";

    /// Key for the backend chat session id.
    pub const CHAT_SESSION_ID: &str = "chat_session_id";

    /// Key for a one-shot notice shown on the next page render.
    pub const FLASH: &str = "flash";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let user = CurrentUser {
            id: UserId::new("u1"),
            email: "an@example.com".to_string(),
            name: "An".to_string(),
            role: UserRole::Customer,
            token: "secret-bearer-token".to_string(),
        };
        let debug = format!("{user:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-bearer-token"));
        assert!(!user.is_admin());
    }
}
