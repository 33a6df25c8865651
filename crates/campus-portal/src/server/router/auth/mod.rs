use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Extension, Json, Router,
};
use campus_access::CurrentIdentity;

use crate::{
    application::{
        auth::{
            self,
            command::{CompletingFirstLoginCommand, SigningInCommand},
            data::SignedInData,
            AuthUseCase,
        },
        Application,
    },
    server::{
        cookie::{cleared_cookie_headers, session_cookie_headers, SessionCookies},
        response::{handle_internal_server_error, ErrorCode, ErrorResponse},
    },
};

use self::{
    request::{CompleteFirstLoginRequest, SignInRequest},
    response::{RoleMismatchData, SignedInResponse, WeakPasswordData},
};

use super::IdentityResponse;

mod request;
mod response;

pub(crate) fn router(application: Arc<Application>) -> axum::Router {
    Router::new()
        .route("/sign-in", post(handle_sign_in))
        .route("/sign-out", post(handle_sign_out))
        .route("/refresh", post(handle_refresh))
        .route("/me", get(handle_me))
        .route("/first-login", post(handle_complete_first_login))
        .with_state(application)
}

fn set_cookies(values: Vec<HeaderValue>) -> AppendHeaders<Vec<(axum::http::HeaderName, HeaderValue)>> {
    AppendHeaders(values.into_iter().map(|value| (SET_COOKIE, value)).collect())
}

fn signed_in(data: SignedInData) -> axum::response::Result<impl IntoResponse> {
    let cookies = session_cookie_headers(&data.tokens)?;

    Ok((StatusCode::OK, set_cookies(cookies), Json(SignedInResponse::from(data))))
}

#[debug_handler]
async fn handle_sign_in(
    State(application): State<Arc<Application>>,
    Json(payload): Json<SignInRequest>,
) -> axum::response::Result<impl IntoResponse> {
    let data = application.auth().sign_in(payload.into()).await?;

    signed_in(data)
}

impl From<SignInRequest> for SigningInCommand {
    fn from(value: SignInRequest) -> Self {
        Self { email: value.email, password: value.password, role: value.role }
    }
}

#[debug_handler]
async fn handle_sign_out(
    State(application): State<Arc<Application>>,
    SessionCookies(tokens): SessionCookies,
) -> axum::response::Result<impl IntoResponse> {
    application.auth().sign_out(tokens).await;

    Ok((StatusCode::NO_CONTENT, set_cookies(cleared_cookie_headers()?)))
}

#[debug_handler]
async fn handle_refresh(
    State(application): State<Arc<Application>>,
    SessionCookies(tokens): SessionCookies,
) -> axum::response::Result<impl IntoResponse> {
    let data = application.auth().refresh(tokens).await?;

    signed_in(data)
}

#[debug_handler]
async fn handle_me(Extension(current): Extension<CurrentIdentity>) -> Result<impl IntoResponse, auth::Error> {
    let identity = current.0.ok_or(auth::Error::NotSignedIn)?;

    Ok(Json(IdentityResponse::from(&identity)))
}

#[debug_handler]
async fn handle_complete_first_login(
    State(application): State<Arc<Application>>,
    SessionCookies(tokens): SessionCookies,
    Json(payload): Json<CompleteFirstLoginRequest>,
) -> axum::response::Result<impl IntoResponse> {
    let data = application
        .auth()
        .complete_first_login(CompletingFirstLoginCommand { tokens, new_password: payload.new_password })
        .await?;

    Ok(Json(SignedInResponse::from(data)))
}

impl IntoResponse for auth::Error {
    fn into_response(self) -> axum::response::Response {
        let message = self.to_string();
        match self {
            auth::Error::Anyhow(e) => handle_internal_server_error(&*e).into_response(),
            auth::Error::InvalidCredentials => {
                ErrorResponse::new(ErrorCode::InvalidCredentials, message).into_response()
            }
            auth::Error::RoleMismatch { expected, actual } => ErrorResponse::new(ErrorCode::RoleMismatch, message)
                .with_data(RoleMismatchData { expected, actual })
                .into_response(),
            auth::Error::UnknownRole(_) => ErrorResponse::new(ErrorCode::UnknownRole, message).into_response(),
            auth::Error::ProfileUnavailable => {
                ErrorResponse::new(ErrorCode::ProfileUnavailable, message).into_response()
            }
            auth::Error::SessionNotSettled => ErrorResponse::new(ErrorCode::SessionNotSettled, message).into_response(),
            auth::Error::NotSignedIn => ErrorResponse::new(ErrorCode::NotSignedIn, message).into_response(),
            auth::Error::WeakPassword { min_length } => ErrorResponse::new(ErrorCode::WeakPassword, message)
                .with_data(WeakPasswordData { min_length })
                .into_response(),
        }
    }
}
