use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::InvalidHeaderValue, request::Parts, HeaderValue, StatusCode},
};
use axum_thiserror::ErrorStatus;
use campus_access::{
    layer::{session_cookies, REFRESH_COOKIE, SESSION_COOKIE},
    SessionTokens,
};
use thiserror::Error;

#[derive(Error, Debug, ErrorStatus)]
pub(crate) enum CookieError {
    #[error("The session token cannot be carried in a cookie. Reason: {0}")]
    #[status(StatusCode::INTERNAL_SERVER_ERROR)]
    InvalidToken(#[from] InvalidHeaderValue),
}

/// Session tokens read from the request cookies, if any.
pub(crate) struct SessionCookies(pub Option<SessionTokens>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionCookies {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_cookies(&parts.headers)))
    }
}

pub(crate) fn session_cookie_headers(tokens: &SessionTokens) -> Result<Vec<HeaderValue>, CookieError> {
    let mut headers = vec![HeaderValue::from_str(&set_cookie(SESSION_COOKIE, &tokens.access_token))?];
    if let Some(refresh_token) = &tokens.refresh_token {
        headers.push(HeaderValue::from_str(&set_cookie(REFRESH_COOKIE, refresh_token))?);
    }
    Ok(headers)
}

pub(crate) fn cleared_cookie_headers() -> Result<Vec<HeaderValue>, CookieError> {
    [SESSION_COOKIE, REFRESH_COOKIE]
        .into_iter()
        .map(|name| HeaderValue::from_str(&format!("{}; Max-Age=0", set_cookie(name, ""))).map_err(CookieError::from))
        .collect()
}

fn set_cookie(name: &str, value: &str) -> String {
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax")
}
