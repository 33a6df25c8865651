use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use campus_access::{
    error::AuthError, session::SessionStore, Identity, IdentityResolver, PortalPolicy, ResolverOptions, Role,
    SessionTokens,
};

use self::{
    command::{CompletingFirstLoginCommand, SigningInCommand},
    data::SignedInData,
};

pub mod command;
pub mod data;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[async_trait]
pub(crate) trait AuthUseCase {
    async fn sign_in(&self, cmd: SigningInCommand) -> Result<SignedInData>;
    async fn sign_out(&self, tokens: Option<SessionTokens>);
    async fn refresh(&self, tokens: Option<SessionTokens>) -> Result<SignedInData>;
    async fn complete_first_login(&self, cmd: CompletingFirstLoginCommand) -> Result<SignedInData>;
}

pub(crate) struct AuthUseCaseImpl {
    session_store: Arc<dyn SessionStore>,
    policy: Arc<PortalPolicy>,
    resolver_options: ResolverOptions,
}

impl AuthUseCaseImpl {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        policy: Arc<PortalPolicy>,
        resolver_options: ResolverOptions,
    ) -> Self {
        Self { session_store, policy, resolver_options }
    }

    fn resolver(&self, tokens: Option<SessionTokens>) -> IdentityResolver {
        match tokens {
            Some(tokens) => {
                IdentityResolver::with_tokens(self.session_store.clone(), self.resolver_options.clone(), tokens)
            }
            None => IdentityResolver::new(self.session_store.clone(), self.resolver_options.clone()),
        }
    }

    async fn signed_in(&self, resolver: &IdentityResolver, identity: Identity) -> Result<SignedInData> {
        let tokens = resolver.tokens().await.ok_or_else(|| anyhow!("resolver kept no session after success"))?;
        let redirect_to = match identity.is_first_login() {
            true => self.policy.setup_path(),
            false => self.policy.default_path_for(identity.role),
        }
        .to_owned();

        Ok(SignedInData { identity, tokens, redirect_to })
    }
}

#[async_trait]
impl AuthUseCase for AuthUseCaseImpl {
    async fn sign_in(&self, cmd: SigningInCommand) -> Result<SignedInData> {
        let expected_role = match cmd.role.as_deref().map(str::trim).filter(|label| !label.is_empty()) {
            Some(label) => Some(Role::normalize(label).ok_or_else(|| Error::UnknownRole(label.to_owned()))?),
            None => None,
        };

        let resolver = self.resolver(None);
        let identity = resolver.sign_in(&cmd.email, &cmd.password, expected_role).await?;

        self.signed_in(&resolver, identity).await
    }

    async fn sign_out(&self, tokens: Option<SessionTokens>) {
        self.resolver(tokens).sign_out().await;
    }

    async fn refresh(&self, tokens: Option<SessionTokens>) -> Result<SignedInData> {
        let resolver = self.resolver(tokens);
        let identity = resolver.refresh().await?;

        self.signed_in(&resolver, identity).await
    }

    async fn complete_first_login(&self, cmd: CompletingFirstLoginCommand) -> Result<SignedInData> {
        if cmd.new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::WeakPassword { min_length: MIN_PASSWORD_LENGTH });
        }

        let resolver = self.resolver(cmd.tokens);
        let identity = resolver.complete_first_login(&cmd.new_password).await?;

        self.signed_in(&resolver, identity).await
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("this account is registered as {actual}, not {expected}")]
    RoleMismatch { expected: Role, actual: Role },
    #[error("'{0}' is not a portal role")]
    UnknownRole(String),
    #[error("the user profile could not be loaded")]
    ProfileUnavailable,
    #[error("the sign-in could not be confirmed, try again")]
    SessionNotSettled,
    #[error("not signed in")]
    NotSignedIn,
    #[error("the new password must be at least {min_length} characters long")]
    WeakPassword { min_length: usize },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<AuthError> for Error {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::RoleMismatch { expected, actual } => Self::RoleMismatch { expected, actual },
            AuthError::ProfileUnavailable { .. } => Self::ProfileUnavailable,
            AuthError::SessionNotSettled { .. } => Self::SessionNotSettled,
            AuthError::NoSession => Self::NotSignedIn,
            e @ (AuthError::Superseded | AuthError::Store(_)) => Self::Anyhow(e.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
