use std::sync::Arc;

use axum::{
    extract::Request,
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderMap,
    },
};
use thiserror::Error;

use crate::resolver::SessionTokens;

pub const SESSION_COOKIE: &str = "campus_session";
pub const REFRESH_COOKIE: &str = "campus_refresh";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("neither a session cookie nor an 'Authorization' header was present")]
    MissingToken,

    #[error("the 'Authorization' header could not be parsed. Reason: {0}")]
    InvalidAuthorizationHeader(String),

    #[error("the 'Authorization' header did not use the 'Bearer ...token' format")]
    MissingBearerToken,
}

pub trait TokenExtractor: Send + Sync + std::fmt::Debug {
    fn extract(&self, request: &Request) -> Result<SessionTokens, ExtractError>;
}

/// Reads the session cookie and falls back to a bearer token.
#[derive(Debug, Clone, Default)]
pub struct SessionTokenExtractor;

impl TokenExtractor for SessionTokenExtractor {
    fn extract(&self, request: &Request) -> Result<SessionTokens, ExtractError> {
        if let Some(tokens) = session_cookies(request.headers()) {
            return Ok(tokens);
        }

        let header = request.headers().get(AUTHORIZATION).ok_or(ExtractError::MissingToken)?;
        header
            .to_str()
            .map_err(|err| ExtractError::InvalidAuthorizationHeader(err.to_string()))?
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
            .map(|token| SessionTokens::new(token, None))
            .ok_or(ExtractError::MissingBearerToken)
    }
}

/// Tokens carried by the session and refresh cookies.
pub fn session_cookies(headers: &HeaderMap) -> Option<SessionTokens> {
    let access_token = cookie(headers, SESSION_COOKIE)?;
    Some(SessionTokens::new(access_token, cookie(headers, REFRESH_COOKIE)))
}

/// Value of the first non-empty cookie called `name`.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}

pub(crate) fn extract_tokens(request: &Request, extractor: Arc<dyn TokenExtractor>) -> Option<SessionTokens> {
    match extractor.extract(request) {
        Ok(tokens) => Some(tokens),
        Err(err) => {
            tracing::debug!(?extractor, ?err, "no session on request");
            None
        }
    }
}
