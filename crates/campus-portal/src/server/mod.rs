use std::sync::Arc;

use axum::{routing::get, Router};
use tracing::debug;

use crate::{application::Application, config::ApplicationConfig};

mod cookie;
mod response;
mod router;

pub(super) struct ServerConfig {
    pub port: u16,
}

impl From<&ApplicationConfig> for ServerConfig {
    fn from(value: &ApplicationConfig) -> Self {
        Self { port: value.port }
    }
}

pub(crate) fn app(application: Arc<Application>) -> Router {
    let access_layer = application.access_layer();

    Router::new()
        .route("/health", get(|| async { "" }))
        .merge(router::login::router(application.clone()))
        .nest("/api/auth", router::auth::router(application.clone()))
        .merge(router::page::router(application))
        .layer(access_layer)
}

pub(super) async fn run(application: Application, config: ServerConfig) -> anyhow::Result<()> {
    let demo_mode = application.is_demo_mode();
    let app = app(Arc::new(application));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    debug!(demo_mode, "starting portal server on {}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
            Request, StatusCode,
        },
        response::Response,
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::app;
    use crate::application::test_support::application;

    fn router() -> Router {
        app(Arc::new(application()))
    }

    fn get(path: &str, cookies: Option<&str>) -> Request<Body> {
        let builder = Request::builder().uri(path);
        let builder = match cookies {
            Some(cookies) => builder.header(COOKIE, cookies),
            None => builder,
        };
        builder.body(Body::empty()).unwrap()
    }

    fn post(path: &str, cookies: Option<&str>, body: Value) -> Request<Body> {
        let builder = Request::builder().method("POST").uri(path).header(CONTENT_TYPE, "application/json");
        let builder = match cookies {
            Some(cookies) => builder.header(COOKIE, cookies),
            None => builder,
        };
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    /// `Cookie` header carrying every non-empty cookie set by `response`.
    fn cookies_of(response: &Response) -> String {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .filter(|pair| !pair.ends_with('='))
            .collect::<Vec<_>>()
            .join("; ")
    }

    async fn sign_in(app: &Router, email: &str, password: &str) -> (String, Value) {
        let response = app
            .clone()
            .oneshot(post("/api/auth/sign-in", None, json!({ "email": email, "password": password })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = cookies_of(&response);
        (cookies, json_body(response).await)
    }

    #[tokio::test]
    async fn health_and_login_pages_are_public() {
        let app = router();

        let health = app.clone().oneshot(get("/health", None)).await.unwrap();
        let login = app.oneshot(get("/login", None)).await.unwrap();

        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(login.status(), StatusCode::OK);
        let body = json_body(login).await;
        assert_eq!(body["roles"].as_array().map(Vec::len), Some(8));
        assert_eq!(body["demoMode"], true);
    }

    #[tokio::test]
    async fn sign_in_sets_cookies_and_points_to_the_role_dashboard() {
        let app = router();

        let (cookies, body) = sign_in(&app, "student@college.edu", "student123").await;

        assert!(cookies.contains("campus_session="));
        assert!(cookies.contains("campus_refresh="));
        assert_eq!(body["redirectTo"], "/student/dashboard");
        assert_eq!(body["identity"]["role"], "student");

        let dashboard = app.clone().oneshot(get("/student/dashboard", Some(&cookies))).await.unwrap();
        let admin = app.clone().oneshot(get("/admin/dashboard", Some(&cookies))).await.unwrap();
        let alias = app.clone().oneshot(get("/dashboard", Some(&cookies))).await.unwrap();
        let login = app.oneshot(get("/login", Some(&cookies))).await.unwrap();

        assert_eq!(dashboard.status(), StatusCode::OK);
        assert_eq!(admin.status(), StatusCode::SEE_OTHER);
        assert_eq!(admin.headers()[LOCATION], "/student/dashboard");
        assert_eq!(alias.headers()[LOCATION], "/student/dashboard");
        assert_eq!(login.headers()[LOCATION], "/student/dashboard");
    }

    #[tokio::test]
    async fn sign_in_errors_carry_codes() {
        let app = router();

        let invalid = app
            .clone()
            .oneshot(post("/api/auth/sign-in", None, json!({ "email": "bad@x.com", "password": "wrong" })))
            .await
            .unwrap();
        let mismatch = app
            .clone()
            .oneshot(post(
                "/api/auth/sign-in",
                None,
                json!({ "email": "student@college.edu", "password": "student123", "role": "accountant" }),
            ))
            .await
            .unwrap();
        let unknown = app
            .oneshot(post(
                "/api/auth/sign-in",
                None,
                json!({ "email": "student@college.edu", "password": "student123", "role": "sports" }),
            ))
            .await
            .unwrap();

        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(invalid).await["code"], "INVALID_CREDENTIALS");
        assert_eq!(mismatch.status(), StatusCode::FORBIDDEN);
        assert!(mismatch.headers().get(SET_COOKIE).is_none());
        let mismatch = json_body(mismatch).await;
        assert_eq!(mismatch["code"], "ROLE_MISMATCH");
        assert_eq!(mismatch["data"]["expected"], "accountant");
        assert_eq!(mismatch["data"]["actual"], "student");
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(unknown).await["code"], "UNKNOWN_ROLE");
    }

    #[tokio::test]
    async fn restricted_page_returns_notice_with_timed_redirect() {
        let app = router();
        let (cookies, _) = sign_in(&app, "faculty@college.edu", "faculty123").await;

        let response = app.oneshot(get("/faculty/leave-approvals", Some(&cookies))).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()["refresh"], "3; url=/faculty/dashboard");
        let body = json_body(response).await;
        assert_eq!(body["code"], "ACCESS_RESTRICTED");
        assert_eq!(body["data"]["allowedRoles"], json!(["hod"]));
        assert_eq!(body["data"]["actualRole"], "faculty");
    }

    #[tokio::test]
    async fn hod_can_open_the_restricted_page() {
        let app = router();
        let (cookies, _) = sign_in(&app, "hod@college.edu", "hod123").await;

        let response = app.oneshot(get("/faculty/leave-approvals", Some(&cookies))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["identity"]["role"], "hod");
    }

    #[tokio::test]
    async fn administrator_can_open_an_accountant_page_shared_with_admins() {
        let app = router();
        let (cookies, _) = sign_in(&app, "admin@college.edu", "admin123").await;

        let shared = app.clone().oneshot(get("/accountant/fee-reports", Some(&cookies))).await.unwrap();
        let private = app.oneshot(get("/accountant/ledger", Some(&cookies))).await.unwrap();

        assert_eq!(shared.status(), StatusCode::OK);
        assert_eq!(json_body(shared).await["identity"]["role"], "administrator");
        assert_eq!(private.status(), StatusCode::SEE_OTHER);
        assert_eq!(private.headers()[LOCATION], "/admin/dashboard");
    }

    #[tokio::test]
    async fn first_login_is_forced_until_completed() {
        let app = router();
        let (cookies, body) = sign_in(&app, "newstudent@college.edu", "welcome123").await;
        assert_eq!(body["redirectTo"], "/auth/first-login");

        let blocked = app.clone().oneshot(get("/student/dashboard", Some(&cookies))).await.unwrap();
        let setup = app.clone().oneshot(get("/auth/first-login", Some(&cookies))).await.unwrap();
        assert_eq!(blocked.headers()[LOCATION], "/auth/first-login");
        assert_eq!(setup.status(), StatusCode::OK);

        let weak = app
            .clone()
            .oneshot(post("/api/auth/first-login", Some(&cookies), json!({ "newPassword": "short" })))
            .await
            .unwrap();
        assert_eq!(weak.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(weak).await["data"]["minLength"], 8);

        let completed = app
            .clone()
            .oneshot(post("/api/auth/first-login", Some(&cookies), json!({ "newPassword": "long-enough" })))
            .await
            .unwrap();
        assert_eq!(completed.status(), StatusCode::OK);
        assert_eq!(json_body(completed).await["redirectTo"], "/student/dashboard");

        let dashboard = app.clone().oneshot(get("/student/dashboard", Some(&cookies))).await.unwrap();
        let setup = app.oneshot(get("/auth/first-login", Some(&cookies))).await.unwrap();
        assert_eq!(dashboard.status(), StatusCode::OK);
        assert_eq!(setup.headers()[LOCATION], "/student/dashboard");
    }

    #[tokio::test]
    async fn sign_out_clears_cookies_and_ends_the_session() {
        let app = router();
        let (cookies, _) = sign_in(&app, "librarian@college.edu", "librarian123").await;

        let me = app.clone().oneshot(get("/api/auth/me", Some(&cookies))).await.unwrap();
        assert_eq!(json_body(me).await["email"], "librarian@college.edu");

        let sign_out = app.clone().oneshot(post("/api/auth/sign-out", Some(&cookies), json!({}))).await.unwrap();
        assert_eq!(sign_out.status(), StatusCode::NO_CONTENT);
        assert!(sign_out
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .all(|value| value.to_str().is_ok_and(|value| value.contains("Max-Age=0"))));

        let me = app.clone().oneshot(get("/api/auth/me", Some(&cookies))).await.unwrap();
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(me).await["code"], "NOT_SIGNED_IN");

        let again = app.oneshot(post("/api/auth/sign-out", None, json!({}))).await.unwrap();
        assert_eq!(again.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn refresh_rotates_the_session_cookie() {
        let app = router();
        let (cookies, _) = sign_in(&app, "placement@college.edu", "placement123").await;

        let refreshed = app.clone().oneshot(post("/api/auth/refresh", Some(&cookies), json!({}))).await.unwrap();
        assert_eq!(refreshed.status(), StatusCode::OK);
        let rotated = cookies_of(&refreshed);
        assert_ne!(rotated, cookies);

        let dashboard = app.clone().oneshot(get("/tnp/dashboard", Some(&rotated))).await.unwrap();
        let stale = app.oneshot(get("/tnp/dashboard", Some(&cookies))).await.unwrap();
        assert_eq!(dashboard.status(), StatusCode::OK);
        assert_eq!(stale.headers()[LOCATION], "/login");
    }
}
