use thiserror::Error;

use crate::role::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("unknown role '{0}'")]
    Unknown(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("an access policy needs at least one allowed role")]
    EmptyRoleSet,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("the session store rejected the credentials")]
    InvalidCredentials,

    #[error("the session is no longer valid")]
    SessionExpired,

    #[error("no profile row exists for user '{0}'")]
    ProfileNotFound(String),

    #[error("could not build a session store url. Reason: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("session store request failed. Reason: {0}")]
    Request(#[from] reqwest::Error),

    #[error("session store responded with status {status}: {message}")]
    Unexpected { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("this account is registered as {actual}, not {expected}")]
    RoleMismatch { expected: Role, actual: Role },

    #[error("the profile of user '{user_id}' could not be loaded")]
    ProfileUnavailable { user_id: String },

    #[error("the session did not become visible after {attempts} attempts")]
    SessionNotSettled { attempts: u32 },

    #[error("a newer sign-in or sign-out superseded this request")]
    Superseded,

    #[error("there is no active session")]
    NoSession,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::InvalidCredentials => Self::InvalidCredentials,
            StoreError::SessionExpired => Self::NoSession,
            other => Self::Store(other),
        }
    }
}
