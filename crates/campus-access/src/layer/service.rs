use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::Request,
    response::{IntoResponse, Redirect},
};
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::{identity::CurrentIdentity, route::RouteDecision};

use super::{extractor, PortalAccessLayer};

#[derive(Clone)]
pub struct PortalAccessService<S> {
    inner: S,
    layer: PortalAccessLayer,
}

impl<S> PortalAccessService<S> {
    pub fn new(inner: S, layer: &PortalAccessLayer) -> Self {
        Self { inner, layer: layer.clone() }
    }
}

impl<S> tower::Service<Request<Body>> for PortalAccessService<S>
where
    S: tower::Service<Request<Body>, Response = axum::response::Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let layer = self.layer.clone();
        Box::pin(async move {
            let identity = match extractor::extract_tokens(&request, layer.token_extractor.clone()) {
                Some(tokens) => layer.resolve(tokens).await,
                None => None,
            };

            match layer.policy.authorize(request.uri().path(), identity.as_ref()) {
                RouteDecision::Allow => {
                    request.extensions_mut().insert(CurrentIdentity(identity));
                    inner.call(request).await
                }
                RouteDecision::Redirect(target) => {
                    debug!(path = %request.uri().path(), %target, "redirecting request");
                    Ok(Redirect::to(&target).into_response())
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::Request,
        http::{header::LOCATION, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    use crate::{
        identity::CurrentIdentity,
        layer::PortalAccessLayer,
        session::{DemoSessionStore, SessionStore},
    };

    async fn whoami(Extension(current): Extension<CurrentIdentity>) -> String {
        current.0.map(|identity| identity.email).unwrap_or_else(|| "anonymous".to_owned())
    }

    fn router(store: Arc<DemoSessionStore>) -> Router {
        Router::new()
            .route("/", get(whoami))
            .route("/student/dashboard", get(whoami))
            .route("/admin/dashboard", get(whoami))
            .layer(PortalAccessLayer::builder().store(store).build())
    }

    fn request(path: &str, access_token: Option<&str>) -> Request {
        let builder = Request::builder().uri(path);
        let builder = match access_token {
            Some(token) => builder.header("cookie", format!("campus_session={token}")),
            None => builder,
        };
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_requests_reach_public_pages_only() {
        let app = router(Arc::new(DemoSessionStore::default()));

        let public = app.clone().oneshot(request("/", None)).await.unwrap();
        let protected = app.oneshot(request("/student/dashboard", None)).await.unwrap();

        assert_eq!(public.status(), StatusCode::OK);
        assert_eq!(to_bytes(public.into_body(), usize::MAX).await.unwrap(), "anonymous");
        assert_eq!(protected.status(), StatusCode::SEE_OTHER);
        assert_eq!(protected.headers()[LOCATION], "/login");
    }

    #[tokio::test]
    async fn signed_in_viewer_gets_identity_extension_on_own_portal() {
        let store = Arc::new(DemoSessionStore::default());
        let session = store.sign_in("student@college.edu", "student123").await.unwrap();
        let app = router(store);

        let response = app.oneshot(request("/student/dashboard", Some(&session.access_token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(to_bytes(response.into_body(), usize::MAX).await.unwrap(), "student@college.edu");
    }

    #[tokio::test]
    async fn cross_portal_requests_are_redirected_home() {
        let store = Arc::new(DemoSessionStore::default());
        let session = store.sign_in("student@college.edu", "student123").await.unwrap();
        let app = router(store);

        let response = app.oneshot(request("/admin/dashboard", Some(&session.access_token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/student/dashboard");
    }

    #[tokio::test]
    async fn signed_out_token_is_treated_as_anonymous() {
        let store = Arc::new(DemoSessionStore::default());
        let session = store.sign_in("admin@college.edu", "admin123").await.unwrap();
        store.sign_out(&session.access_token).await.unwrap();
        let app = router(store);

        let response = app.oneshot(request("/admin/dashboard", Some(&session.access_token))).await.unwrap();

        assert_eq!(response.headers()[LOCATION], "/login");
    }
}
