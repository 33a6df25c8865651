use std::sync::Arc;

use axum::{debug_handler, extract::State, response::IntoResponse, routing::get, Json, Router};
use campus_access::Role;

use crate::application::Application;

use self::response::{LoginPageResponse, RoleOption};

mod response;

pub(crate) fn router(application: Arc<Application>) -> axum::Router {
    Router::new()
        .route("/", get(handle_login_page))
        .route("/login", get(handle_login_page))
        .with_state(application)
}

#[debug_handler]
async fn handle_login_page(State(application): State<Arc<Application>>) -> impl IntoResponse {
    Json(LoginPageResponse {
        roles: Role::ALL.into_iter().map(|role| RoleOption { value: role, label: role.label() }).collect(),
        demo_mode: application.is_demo_mode(),
        sign_in_endpoint: "/api/auth/sign-in",
    })
}
