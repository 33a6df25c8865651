use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

pub(crate) fn handle_internal_server_error<E: std::error::Error + ?Sized>(e: &E) -> impl IntoResponse {
    error!(error = %e, "unhandled error occurred.");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Error codes the portal answers with. Each code has exactly one status.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ErrorCode {
    InvalidCredentials,
    RoleMismatch,
    UnknownRole,
    ProfileUnavailable,
    SessionNotSettled,
    NotSignedIn,
    WeakPassword,
    AccessRestricted,
    PageNotFound,
}

impl ErrorCode {
    pub(crate) fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidCredentials | ErrorCode::NotSignedIn => StatusCode::UNAUTHORIZED,
            ErrorCode::RoleMismatch | ErrorCode::ProfileUnavailable | ErrorCode::AccessRestricted => {
                StatusCode::FORBIDDEN
            }
            ErrorCode::UnknownRole | ErrorCode::WeakPassword => StatusCode::BAD_REQUEST,
            ErrorCode::SessionNotSettled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::PageNotFound => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct EmptyData {}

/// `{code, message, data}` body sent with the status of its code.
#[derive(Serialize, Debug)]
pub(crate) struct ErrorResponse<D: Serialize = EmptyData> {
    code: ErrorCode,
    message: String,
    data: D,
}

impl ErrorResponse {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: EmptyData {} }
    }
}

impl<D: Serialize> ErrorResponse<D> {
    pub(crate) fn with_data<T: Serialize>(self, data: T) -> ErrorResponse<T> {
        ErrorResponse { code: self.code, message: self.message, data }
    }
}

impl<D: Serialize> IntoResponse for ErrorResponse<D> {
    fn into_response(self) -> axum::response::Response {
        (self.code.status(), Json(self)).into_response()
    }
}
