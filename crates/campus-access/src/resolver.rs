//! Identity resolution.
//!
//! [`IdentityResolver`] turns the active session of one viewer into an
//! [`Identity`] and keeps it in an [`IdentityCell`]. The cell has one writer (the
//! resolver) and any number of readers. Every resolution takes a ticket from
//! the cell first; publishing with an outdated ticket is ignored, which is how a
//! slow sign-in that finishes after a sign-out is kept from bringing the
//! identity back.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use bon::Builder;
use serde::Deserialize;
use tokio::{
    sync::{broadcast::error::RecvError, watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::AuthError,
    identity::Identity,
    role::Role,
    session::{Session, SessionEvent, SessionStore},
};

const MAX_SETTLE_BACKOFF: Duration = Duration::from_secs(1);

/// What to do when a session is valid but its profile row cannot be used.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileFallback {
    /// Treat the viewer as signed out.
    #[default]
    Deny,
    /// Continue with [`Identity::minimal`]. This weakens role gating because
    /// every such viewer becomes a student.
    Minimal,
}

#[derive(Builder, Debug, Clone)]
pub struct ResolverOptions {
    #[builder(default = 5)]
    pub settle_attempts: u32,
    #[builder(default = Duration::from_millis(50))]
    pub settle_backoff: Duration,
    #[builder(default)]
    pub profile_fallback: ProfileFallback,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token }
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").finish_non_exhaustive()
    }
}

impl From<&Session> for SessionTokens {
    fn from(session: &Session) -> Self {
        Self { access_token: session.access_token.clone(), refresh_token: session.refresh_token.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTicket(u64);

pub struct IdentityCell {
    sender: watch::Sender<Option<Identity>>,
    generation: AtomicU64,
}

impl Default for IdentityCell {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityCell {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender, generation: AtomicU64::new(0) }
    }

    /// Starts a resolution, superseding every resolution still in flight.
    pub fn begin(&self) -> ResolutionTicket {
        ResolutionTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: ResolutionTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Stores `identity` unless a newer resolution has started. Returns whether
    /// the value was accepted.
    pub fn publish(&self, ticket: ResolutionTicket, identity: Option<Identity>) -> bool {
        self.sender.send_if_modified(|current| {
            if !self.is_current(ticket) {
                return false;
            }
            *current = identity;
            true
        })
    }

    pub fn current(&self) -> Option<Identity> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.sender.subscribe()
    }
}

pub struct IdentityResolver {
    store: Arc<dyn SessionStore>,
    options: ResolverOptions,
    tokens: RwLock<Option<SessionTokens>>,
    cell: IdentityCell,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn SessionStore>, options: ResolverOptions) -> Self {
        Self { store, options, tokens: RwLock::new(None), cell: IdentityCell::new() }
    }

    /// Resolver for a viewer that already holds a session, e.g. from a cookie.
    pub fn with_tokens(store: Arc<dyn SessionStore>, options: ResolverOptions, tokens: SessionTokens) -> Self {
        Self { store, options, tokens: RwLock::new(Some(tokens)), cell: IdentityCell::new() }
    }

    pub fn cell(&self) -> &IdentityCell {
        &self.cell
    }

    pub fn current(&self) -> Option<Identity> {
        self.cell.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.cell.subscribe()
    }

    pub async fn tokens(&self) -> Option<SessionTokens> {
        self.tokens.read().await.clone()
    }

    /// Drops the result of any resolution still in flight.
    pub fn cancel_pending(&self) {
        self.cell.cancel_pending();
    }

    /// Resolves the identity of the active session. Store failures are logged
    /// and reported as "no identity".
    pub async fn resolve_current(&self) -> Option<Identity> {
        let ticket = self.cell.begin();
        let tokens = self.tokens.read().await.clone();

        let identity = match tokens {
            Some(tokens) => self.resolve_tokens(&tokens).await,
            None => None,
        };

        if self.cell.publish(ticket, identity.clone()) {
            identity
        } else {
            debug!("discarding a superseded identity resolution");
            self.cell.current()
        }
    }

    /// Authenticates and, when `expected_role` is given, checks that the account
    /// actually holds that role.
    pub async fn sign_in(&self, email: &str, password: &str, expected_role: Option<Role>) -> Result<Identity> {
        let ticket = self.cell.begin();

        let session = self.store.sign_in(email, password).await?;
        let session = self.await_settled(session).await?;

        let identity = match self.load_identity(&session).await {
            Ok(identity) => identity,
            Err(e) => {
                self.discard_session(&session).await;
                return Err(e);
            }
        };

        if let Some(expected) = expected_role {
            if identity.role != expected {
                info!(user_id = %identity.id, %expected, actual = %identity.role, "sign-in role mismatch");
                self.discard_session(&session).await;
                return Err(AuthError::RoleMismatch { expected, actual: identity.role });
            }
        }

        let mut tokens = self.tokens.write().await;
        if !self.cell.publish(ticket, Some(identity.clone())) {
            drop(tokens);
            self.discard_session(&session).await;
            return Err(AuthError::Superseded);
        }
        *tokens = Some(SessionTokens::from(&session));

        info!(user_id = %identity.id, role = %identity.role, "signed in");
        Ok(identity)
    }

    /// Ends the session. Calling it without a session is a no-op.
    pub async fn sign_out(&self) {
        let mut tokens = self.tokens.write().await;
        let ticket = self.cell.begin();

        if let Some(previous) = tokens.take() {
            if let Err(e) = self.store.sign_out(&previous.access_token).await {
                warn!(error = %e, "session store failed to end the session");
            }
            info!("signed out");
        }

        self.cell.publish(ticket, None);
    }

    /// Exchanges the refresh token for a new session and re-resolves.
    /// The token lock is held until the new tokens are stored, so the store's
    /// own `TokenRefreshed` event no longer matches once a watcher sees it.
    pub async fn refresh(&self) -> Result<Identity> {
        let mut tokens = self.tokens.write().await;
        let ticket = self.cell.begin();
        let refresh_token =
            tokens.as_ref().and_then(|tokens| tokens.refresh_token.clone()).ok_or(AuthError::NoSession)?;

        let session = self.store.refresh_session(&refresh_token).await?;
        let identity = self.load_identity(&session).await?;

        if !self.cell.publish(ticket, Some(identity.clone())) {
            return Err(AuthError::Superseded);
        }
        *tokens = Some(SessionTokens::from(&session));

        Ok(identity)
    }

    /// Stores the new password, clears the first-login flag and re-resolves.
    pub async fn complete_first_login(&self, new_password: &str) -> Result<Identity> {
        let tokens = self.tokens.read().await.clone().ok_or(AuthError::NoSession)?;
        let session = self.store.get_session(&tokens.access_token).await?.ok_or(AuthError::NoSession)?;

        self.store.complete_first_login(&tokens.access_token, &session.user_id, new_password).await?;

        self.resolve_current().await.ok_or(AuthError::NoSession)
    }

    /// Applies one store event. Events about other viewers' sessions are ignored.
    pub async fn apply_session_event(&self, event: SessionEvent) {
        let current = self.tokens.read().await.clone();
        let kind = event.kind();

        match (event, current) {
            (SessionEvent::SignedIn { access_token }, Some(current))
            | (SessionEvent::UserUpdated { access_token }, Some(current))
                if current.access_token == access_token =>
            {
                self.resolve_current().await;
            }
            (SessionEvent::TokenRefreshed { previous_refresh_token, session }, Some(_)) => {
                let mut tokens = self.tokens.write().await;
                let matches = tokens
                    .as_ref()
                    .is_some_and(|current| current.refresh_token.as_deref() == Some(previous_refresh_token.as_str()));
                if !matches {
                    debug!(kind, "ignoring a session event for another viewer");
                    return;
                }
                *tokens = Some(SessionTokens::from(&session));
                drop(tokens);
                self.resolve_current().await;
            }
            (SessionEvent::SignedOut { access_token }, Some(current)) if current.access_token == access_token => {
                let mut tokens = self.tokens.write().await;
                let ticket = self.cell.begin();
                *tokens = None;
                self.cell.publish(ticket, None);
            }
            _ => debug!(kind, "ignoring a session event for another viewer"),
        }
    }

    /// Applies store events in the order the store emits them until the store
    /// goes away.
    pub fn watch_session_changes(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.apply_session_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed session events, resolving again");
                        self.resolve_current().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn resolve_tokens(&self, tokens: &SessionTokens) -> Option<Identity> {
        match self.store.get_session(&tokens.access_token).await {
            Ok(Some(session)) => self.load_identity(&session).await.ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "session lookup failed");
                None
            }
        }
    }

    async fn load_identity(&self, session: &Session) -> Result<Identity> {
        let row = match self.store.get_profile(&session.access_token, &session.user_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "profile fetch failed");
                return self.fallback_identity(session);
            }
        };

        match Identity::from_profile_row(session, row) {
            Ok(identity) => Ok(identity),
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "profile row carries no usable role");
                self.fallback_identity(session)
            }
        }
    }

    fn fallback_identity(&self, session: &Session) -> Result<Identity> {
        match self.options.profile_fallback {
            ProfileFallback::Deny => Err(AuthError::ProfileUnavailable { user_id: session.user_id.clone() }),
            ProfileFallback::Minimal => {
                warn!(user_id = %session.user_id, "continuing with a minimal identity, role gating is weakened");
                Ok(Identity::minimal(session))
            }
        }
    }

    /// Polls until the store reports the new session, instead of sleeping for a
    /// fixed time after sign-in.
    async fn await_settled(&self, session: Session) -> Result<Session> {
        let attempts = self.options.settle_attempts.max(1);
        let mut backoff = self.options.settle_backoff;

        for attempt in 1..=attempts {
            match self.store.get_session(&session.access_token).await {
                Ok(Some(visible)) if visible.user_id == session.user_id => return Ok(session),
                Ok(_) => debug!(attempt, "session not visible yet"),
                Err(e) => debug!(attempt, error = %e, "session lookup failed while settling"),
            }
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_SETTLE_BACKOFF);
            }
        }

        self.discard_session(&session).await;
        Err(AuthError::SessionNotSettled { attempts })
    }

    async fn discard_session(&self, session: &Session) {
        if let Err(e) = self.store.sign_out(&session.access_token).await {
            warn!(error = %e, "failed to discard a session");
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
