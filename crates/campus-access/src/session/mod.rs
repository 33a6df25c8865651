//! Contract of the external auth + profile service and its two implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::StoreError;

pub mod demo;
pub mod hosted;

pub use demo::{default_demo_accounts, DemoAccount, DemoSessionStore};
pub use hosted::HostedSessionStore;

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A row of the profile table. Only `role` and `is_first_login` drive access
/// decisions; everything else is carried through as attributes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default, alias = "first_login")]
    pub is_first_login: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Clone, Debug)]
pub enum SessionEvent {
    SignedIn { access_token: String },
    TokenRefreshed { previous_refresh_token: String, session: Session },
    UserUpdated { access_token: String },
    SignedOut { access_token: String },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn { .. } => "signed_in",
            SessionEvent::TokenRefreshed { .. } => "token_refreshed",
            SessionEvent::UserUpdated { .. } => "user_updated",
            SessionEvent::SignedOut { .. } => "signed_out",
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// `Ok(None)` when the token is unknown or expired.
    async fn get_session(&self, access_token: &str) -> Result<Option<Session>>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    async fn get_profile(&self, access_token: &str, user_id: &str) -> Result<ProfileRow>;

    /// Stores the new password and clears the first-login flag.
    async fn complete_first_login(&self, access_token: &str, user_id: &str, new_password: &str) -> Result<()>;

    /// Must succeed for tokens that are already signed out.
    async fn sign_out(&self, access_token: &str) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod test {
    use super::ProfileRow;

    #[test]
    fn profile_row_keeps_unknown_columns_as_attributes() {
        let row: ProfileRow = serde_json::from_value(serde_json::json!({
            "id": "u-1",
            "role": "hostel",
            "first_login": true,
            "full_name": "Asha Rao",
            "department": "CSE",
        }))
        .expect("profile row should deserialize");

        assert_eq!(row.role, "hostel");
        assert!(row.is_first_login);
        assert_eq!(row.email, None);
        assert_eq!(row.attributes.get("department").and_then(|v| v.as_str()), Some("CSE"));
        assert!(!row.attributes.contains_key("id"));
    }
}
