//! User session domain type.
//!
//! A session is created by a successful password login and gates the
//! authorization endpoint. Sessions persist across restarts.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A logged-in user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    /// Opaque session identifier handed to the frontend.
    pub id: String,

    /// User this session belongs to.
    pub user_id: String,

    /// Username at login time, for display.
    pub username: String,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the session expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl UserSession {
    /// Create a new session for a user with the given lifetime.
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, lifetime: time::Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            username: username.into(),
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    /// Returns `true` if this session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_new_session() {
        let session = UserSession::new("user-1", "alice", Duration::hours(24));
        assert!(!session.is_expired());
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.username, "alice");
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
    }

    #[test]
    fn test_expired_session() {
        let session = UserSession::new("user-1", "alice", Duration::seconds(-1));
        assert!(session.is_expired());
    }

    #[test]
    fn test_session_ids_unique() {
        let a = UserSession::new("user-1", "alice", Duration::hours(1));
        let b = UserSession::new("user-1", "alice", Duration::hours(1));
        assert_ne!(a.id, b.id);
    }
}
