use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info};
use url::Url;

use super::{ProfileRow, Result, Session, SessionEvent, SessionStore, EVENT_CHANNEL_CAPACITY};
use crate::error::StoreError;

pub const DEFAULT_PROFILE_TABLE: &str = "profiles";

const API_KEY_HEADER: &str = "apikey";

const FIRST_LOGIN_COLUMN: &str = "first_login";

/// Client of a hosted auth + REST service.
pub struct HostedSessionStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    profile_table: String,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: UserResponse,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            user_id: self.user.id,
            email: self.user.email.unwrap_or_default(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

impl HostedSessionStore {
    pub fn new(base_url: Url, api_key: impl Into<String>, profile_table: impl Into<String>) -> Self {
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            profile_table: profile_table.into(),
            events,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn profile_endpoint(&self, user_id: &str) -> Result<Url> {
        let mut url = self.endpoint(&format!("rest/v1/{}", self.profile_table))?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{user_id}"));
        Ok(url)
    }

    async fn request_token(&self, grant_type: &str, body: serde_json::Value) -> Result<Response> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        Ok(self.client.post(url).header(API_KEY_HEADER, &self.api_key).json(&body).send().await?)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

async fn unexpected(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StoreError::Unexpected { status, message }
}

#[async_trait]
impl SessionStore for HostedSessionStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self.request_token("password", json!({ "email": email, "password": password })).await?;

        match response.status() {
            status if status.is_success() => {
                let session = response.json::<TokenResponse>().await?.into_session();
                info!(user_id = %session.user_id, "hosted session issued");
                self.emit(SessionEvent::SignedIn { access_token: session.access_token.clone() });
                Ok(session)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(StoreError::InvalidCredentials),
            _ => Err(unexpected(response).await),
        }
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<Session>> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user = response.json::<UserResponse>().await?;
                Ok(Some(Session {
                    user_id: user.id,
                    email: user.email.unwrap_or_default(),
                    access_token: access_token.to_owned(),
                    refresh_token: None,
                    expires_at: None,
                }))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("hosted store does not recognise the session");
                Ok(None)
            }
            _ => Err(unexpected(response).await),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let response = self.request_token("refresh_token", json!({ "refresh_token": refresh_token })).await?;

        match response.status() {
            status if status.is_success() => {
                let session = response.json::<TokenResponse>().await?.into_session();
                self.emit(SessionEvent::TokenRefreshed {
                    previous_refresh_token: refresh_token.to_owned(),
                    session: session.clone(),
                });
                Ok(session)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(StoreError::SessionExpired),
            _ => Err(unexpected(response).await),
        }
    }

    async fn get_profile(&self, access_token: &str, user_id: &str) -> Result<ProfileRow> {
        let mut url = self.profile_endpoint(user_id)?;
        url.query_pairs_mut().append_pair("select", "*");

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        response
            .json::<Vec<ProfileRow>>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_owned()))
    }

    async fn complete_first_login(&self, access_token: &str, user_id: &str, new_password: &str) -> Result<()> {
        let response = self
            .client
            .put(self.endpoint("auth/v1/user")?)
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(StoreError::SessionExpired),
            _ => return Err(unexpected(response).await),
        }

        let response = self
            .client
            .patch(self.profile_endpoint(user_id)?)
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(access_token)
            .json(&json!({ FIRST_LOGIN_COLUMN: false }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        info!(user_id, "first login completed");
        self.emit(SessionEvent::UserUpdated { access_token: access_token.to_owned() });
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                self.emit(SessionEvent::SignedOut { access_token: access_token.to_owned() });
                Ok(())
            }
            // already signed out
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(()),
            _ => Err(unexpected(response).await),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
