use tracing::debug;

use crate::{
    identity::Identity,
    policy::{normalize_path, PortalPolicy},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(String),
}

impl PortalPolicy {
    /// Decides whether a request for `path` may be served. The checks run in a
    /// fixed order: public paths, missing identity, dashboard alias, role
    /// prefixes, first-login setup.
    pub fn authorize(&self, path: &str, identity: Option<&Identity>) -> RouteDecision {
        let path = normalize_path(path);

        if self.is_public(path) {
            return match identity {
                Some(identity) if self.is_login_path(path) => {
                    debug!(path, role = %identity.role, "signed-in user opened a login page");
                    RouteDecision::Redirect(self.default_path_for(identity.role).to_owned())
                }
                _ => RouteDecision::Allow,
            };
        }

        let Some(identity) = identity else {
            debug!(path, "no identity for a protected path");
            return RouteDecision::Redirect(self.sign_in_path().to_owned());
        };

        if path == normalize_path(self.dashboard_alias()) {
            return RouteDecision::Redirect(self.default_path_for(identity.role).to_owned());
        }

        if !self.admits(identity.role, path) {
            debug!(path, role = %identity.role, "cross-portal access denied");
            return RouteDecision::Redirect(self.default_path_for(identity.role).to_owned());
        }

        if identity.is_first_login() && !self.is_setup_path(path) {
            return RouteDecision::Redirect(self.setup_path().to_owned());
        }

        RouteDecision::Allow
    }
}
