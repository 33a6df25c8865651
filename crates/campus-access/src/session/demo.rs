use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use ulid::Ulid;

use super::{ProfileRow, Result, Session, SessionEvent, SessionStore, EVENT_CHANNEL_CAPACITY};
use crate::error::StoreError;

pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 3600;

/// One row of the static credential table used when no hosted store is
/// configured.
#[derive(Deserialize, Clone, Debug)]
pub struct DemoAccount {
    pub id: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub first_login: bool,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl DemoAccount {
    fn new(id: &str, email: &str, password: &str, role: &str, name: &str, department: Option<&str>) -> Self {
        let mut attributes = Map::new();
        attributes.insert("full_name".to_owned(), Value::String(name.to_owned()));
        if let Some(department) = department {
            attributes.insert("department".to_owned(), Value::String(department.to_owned()));
        }
        Self {
            id: id.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
            role: role.to_owned(),
            first_login: false,
            attributes,
        }
    }

    fn profile_row(&self) -> ProfileRow {
        ProfileRow {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: self.role.clone(),
            is_first_login: self.first_login,
            attributes: self.attributes.clone(),
        }
    }
}

pub fn default_demo_accounts() -> Vec<DemoAccount> {
    let mut newcomer = DemoAccount::new(
        "demo-student-new",
        "newstudent@college.edu",
        "welcome123",
        "student",
        "New Student",
        Some("CSE"),
    );
    newcomer.first_login = true;

    vec![
        DemoAccount::new("demo-student", "student@college.edu", "student123", "student", "Demo Student", Some("CSE")),
        DemoAccount::new("demo-faculty", "faculty@college.edu", "faculty123", "teacher", "Demo Faculty", Some("CSE")),
        DemoAccount::new("demo-hod", "hod@college.edu", "hod123", "hod", "Demo HOD", Some("CSE")),
        DemoAccount::new("demo-admin", "admin@college.edu", "admin123", "admin", "Demo Administrator", None),
        DemoAccount::new(
            "demo-accountant",
            "accountant@college.edu",
            "accountant123",
            "accountant",
            "Demo Accountant",
            None,
        ),
        DemoAccount::new(
            "demo-librarian",
            "librarian@college.edu",
            "librarian123",
            "librarian",
            "Demo Librarian",
            None,
        ),
        DemoAccount::new(
            "demo-tnp",
            "placement@college.edu",
            "placement123",
            "placement",
            "Demo Placement Officer",
            None,
        ),
        DemoAccount::new("demo-hostel", "hostel@college.edu", "hostel123", "hostel", "Demo Warden", None),
        newcomer,
    ]
}

struct DemoSession {
    user_id: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

pub struct DemoSessionStore {
    accounts: RwLock<Vec<DemoAccount>>,
    sessions: RwLock<HashMap<String, DemoSession>>,
    session_lifetime: Duration,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for DemoSessionStore {
    fn default() -> Self {
        Self::new(default_demo_accounts())
    }
}

impl DemoSessionStore {
    pub fn new(accounts: Vec<DemoAccount>) -> Self {
        Self::with_session_lifetime(accounts, Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS))
    }

    pub fn with_session_lifetime(accounts: Vec<DemoAccount>, session_lifetime: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { accounts: RwLock::new(accounts), sessions: RwLock::new(HashMap::new()), session_lifetime, events }
    }

    async fn issue_session(&self, account: &DemoAccount) -> Session {
        let access_token = Ulid::new().to_string();
        let refresh_token = Ulid::new().to_string();
        let expires_at = Utc::now() + self.session_lifetime;

        self.sessions.write().await.insert(
            access_token.clone(),
            DemoSession { user_id: account.id.clone(), refresh_token: refresh_token.clone(), expires_at },
        );

        Session {
            user_id: account.id.clone(),
            email: account.email.clone(),
            access_token,
            refresh_token: Some(refresh_token),
            expires_at: Some(expires_at),
        }
    }

    async fn account_by_id(&self, user_id: &str) -> Option<DemoAccount> {
        self.accounts.read().await.iter().find(|account| account.id == user_id).cloned()
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SessionStore for DemoSessionStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let account = self
            .accounts
            .read()
            .await
            .iter()
            .find(|account| account.email.eq_ignore_ascii_case(email.trim()) && account.password == password)
            .cloned()
            .ok_or(StoreError::InvalidCredentials)?;

        let session = self.issue_session(&account).await;
        info!(user_id = %account.id, "demo session issued");
        self.emit(SessionEvent::SignedIn { access_token: session.access_token.clone() });

        Ok(session)
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<Session>> {
        let (user_id, refresh_token, expires_at) = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(access_token) {
                Some(session) if session.expires_at > Utc::now() => {
                    (session.user_id.clone(), session.refresh_token.clone(), session.expires_at)
                }
                Some(_) => {
                    debug!("demo session expired");
                    sessions.remove(access_token);
                    return Ok(None);
                }
                None => return Ok(None),
            }
        };

        Ok(self.account_by_id(&user_id).await.map(|account| Session {
            user_id: account.id,
            email: account.email,
            access_token: access_token.to_owned(),
            refresh_token: Some(refresh_token),
            expires_at: Some(expires_at),
        }))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let previous = {
            let mut sessions = self.sessions.write().await;
            let access_token = sessions
                .iter()
                .find(|(_, session)| session.refresh_token == refresh_token)
                .map(|(access_token, _)| access_token.clone())
                .ok_or(StoreError::SessionExpired)?;
            sessions.remove(&access_token).ok_or(StoreError::SessionExpired)?
        };

        let account = self.account_by_id(&previous.user_id).await.ok_or(StoreError::SessionExpired)?;
        let session = self.issue_session(&account).await;
        self.emit(SessionEvent::TokenRefreshed {
            previous_refresh_token: refresh_token.to_owned(),
            session: session.clone(),
        });

        Ok(session)
    }

    async fn get_profile(&self, _access_token: &str, user_id: &str) -> Result<ProfileRow> {
        self.account_by_id(user_id)
            .await
            .map(|account| account.profile_row())
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_owned()))
    }

    async fn complete_first_login(&self, access_token: &str, user_id: &str, new_password: &str) -> Result<()> {
        if self.get_session(access_token).await?.map(|session| session.user_id).as_deref() != Some(user_id) {
            return Err(StoreError::SessionExpired);
        }

        {
            let mut accounts = self.accounts.write().await;
            let account = accounts
                .iter_mut()
                .find(|account| account.id == user_id)
                .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_owned()))?;
            account.password = new_password.to_owned();
            account.first_login = false;
        }

        info!(user_id, "demo account completed first login");
        self.emit(SessionEvent::UserUpdated { access_token: access_token.to_owned() });
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        if self.sessions.write().await.remove(access_token).is_some() {
            self.emit(SessionEvent::SignedOut { access_token: access_token.to_owned() });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
