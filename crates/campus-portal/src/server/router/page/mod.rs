use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Json, Router,
};
use campus_access::CurrentIdentity;

use crate::application::{
    auth::MIN_PASSWORD_LENGTH,
    page::{PageOutcome, PageUseCase},
    Application,
};

use self::response::{PageNotFoundErrorResponse, PageResponse, RestrictedPageResponse, SetupPageResponse};

use super::IdentityResponse;

mod response;

pub(crate) fn router(application: Arc<Application>) -> axum::Router {
    Router::new()
        .route("/auth/first-login", get(handle_setup_page))
        .fallback(handle_page)
        .with_state(application)
}

#[debug_handler]
async fn handle_setup_page(
    State(application): State<Arc<Application>>,
    Extension(current): Extension<CurrentIdentity>,
) -> Response {
    let policy = application.policy();
    match current.0 {
        None => Redirect::to(policy.sign_in_path()).into_response(),
        Some(identity) if !identity.is_first_login() => {
            Redirect::to(policy.default_path_for(identity.role)).into_response()
        }
        Some(identity) => Json(SetupPageResponse {
            identity: IdentityResponse::from(&identity),
            min_password_length: MIN_PASSWORD_LENGTH,
            complete_endpoint: "/api/auth/first-login",
        })
        .into_response(),
    }
}

async fn handle_page(
    State(application): State<Arc<Application>>,
    Extension(current): Extension<CurrentIdentity>,
    uri: Uri,
) -> Response {
    match application.page().open(uri.path(), current.0.as_ref()) {
        PageOutcome::Render(data) => (StatusCode::OK, Json(PageResponse::from(data))).into_response(),
        PageOutcome::Restricted(notice) => RestrictedPageResponse(notice).into_response(),
        PageOutcome::SignInRequired(target) => Redirect::to(&target).into_response(),
        PageOutcome::NotFound => PageNotFoundErrorResponse.into_response(),
    }
}
