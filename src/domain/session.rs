//! Explicit authenticated session passed to privileged operations.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Tokens are treated as expired this long before their stated expiry.
pub const EXPIRY_SKEW: Duration = Duration::seconds(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: SessionUser,
}

impl Session {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now + EXPIRY_SKEW >= self.expires_at
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Which authenticated users may act on articles they do not own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminPolicy {
    admin_emails: Vec<String>,
}

impl AdminPolicy {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let admin_emails = emails
            .into_iter()
            .map(|email| email.as_ref().trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        Self { admin_emails }
    }

    /// An empty allow-list grants administration to every signed-in user.
    pub fn is_admin(&self, session: &Session) -> bool {
        if self.admin_emails.is_empty() {
            return true;
        }
        session
            .user
            .email
            .as_deref()
            .map(|email| email.trim().to_lowercase())
            .is_some_and(|email| self.admin_emails.contains(&email))
    }
}
