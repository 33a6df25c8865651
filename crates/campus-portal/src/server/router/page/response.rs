use axum::{http::HeaderName, response::IntoResponse};
use campus_access::{RestrictionNotice, Role};
use serde::Serialize;

use crate::{
    application::page::PageData,
    server::{
        response::{ErrorCode, ErrorResponse},
        router::IdentityResponse,
    },
};

const REFRESH: HeaderName = HeaderName::from_static("refresh");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PageResponse {
    pub path: String,
    pub allowed_roles: Vec<Role>,
    pub identity: IdentityResponse,
}

impl From<PageData> for PageResponse {
    fn from(value: PageData) -> Self {
        Self { path: value.path, allowed_roles: value.allowed_roles, identity: IdentityResponse::from(&value.identity) }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SetupPageResponse {
    pub identity: IdentityResponse,
    pub min_password_length: usize,
    pub complete_endpoint: &'static str,
}

/// Restriction notice plus a `Refresh` header that performs the timed redirect.
pub(super) struct RestrictedPageResponse(pub RestrictionNotice);

impl IntoResponse for RestrictedPageResponse {
    fn into_response(self) -> axum::response::Response {
        let notice = self.0;
        let refresh = format!("{}; url={}", notice.grace_period_secs, notice.redirect_to);
        let message = notice.message.clone();
        let body = ErrorResponse::new(ErrorCode::AccessRestricted, message).with_data(notice);

        ([(REFRESH, refresh)], body).into_response()
    }
}

pub(super) struct PageNotFoundErrorResponse;

impl IntoResponse for PageNotFoundErrorResponse {
    fn into_response(self) -> axum::response::Response {
        ErrorResponse::new(ErrorCode::PageNotFound, "page does not exist.").into_response()
    }
}
