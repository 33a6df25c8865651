//! Route middleware for axum routers.

use std::sync::Arc;

use bon::Builder;
use tower::Layer;

use crate::{
    identity::Identity,
    policy::PortalPolicy,
    resolver::{IdentityResolver, ResolverOptions, SessionTokens},
    session::SessionStore,
};

pub mod extractor;
mod service;

pub use extractor::{
    session_cookies, ExtractError, SessionTokenExtractor, TokenExtractor, REFRESH_COOKIE, SESSION_COOKIE,
};
pub use service::PortalAccessService;

/// Resolves the viewer of every request, applies [`PortalPolicy::authorize`] and
/// either redirects or hands the request on with a
/// [`CurrentIdentity`](crate::identity::CurrentIdentity) extension.
#[derive(Builder, Clone)]
pub struct PortalAccessLayer {
    pub store: Arc<dyn SessionStore>,

    #[builder(default)]
    pub policy: Arc<PortalPolicy>,

    #[builder(default)]
    pub options: ResolverOptions,

    #[builder(default = Arc::new(SessionTokenExtractor))]
    pub token_extractor: Arc<dyn TokenExtractor>,
}

impl PortalAccessLayer {
    pub async fn resolve(&self, tokens: SessionTokens) -> Option<Identity> {
        IdentityResolver::with_tokens(self.store.clone(), self.options.clone(), tokens).resolve_current().await
    }
}

impl<S> Layer<S> for PortalAccessLayer {
    type Service = PortalAccessService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PortalAccessService::new(inner, self)
    }
}
