//! Authenticated session identity.
//!
//! A [`Session`] is handed to [`crate::channel::ChatChannel::login`] once the
//! surrounding application has authenticated the user. Its presence is what
//! gates whether the chat channel should be connected at all.

use serde::{Deserialize, Serialize};

/// The authenticated identity of the current end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend user identifier, sent in the `auth` frame.
    pub user_id: String,
    /// Display name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Session {
    /// Creates a session for `user_id` with no profile details.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            email: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Returns `true` if both sessions belong to the same user.
    #[must_use]
    pub fn same_user(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_profile() {
        let session = Session::new("u1").with_name("Ada").with_email("ada@example.com");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.name.as_deref(), Some("Ada"));
        assert_eq!(session.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_same_user_ignores_profile() {
        let a = Session::new("u1").with_name("Ada");
        let b = Session::new("u1");
        assert!(a.same_user(&b));
        assert!(!a.same_user(&Session::new("u2")));
    }

    #[test]
    fn test_serialization_skips_missing_profile() {
        let json = serde_json::to_value(Session::new("u1")).expect("serialize");
        assert_eq!(json, serde_json::json!({ "user_id": "u1" }));
    }
}
