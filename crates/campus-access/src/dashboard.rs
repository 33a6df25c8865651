use std::collections::HashMap;

use tracing::warn;

use crate::role::Role;

pub const FALLBACK_PATH: &str = "/";

/// Landing page of every role. Lookups never fail: a missing entry resolves to
/// the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDashboardMap {
    paths: HashMap<Role, String>,
    fallback: String,
}

impl Default for RoleDashboardMap {
    fn default() -> Self {
        let paths = Role::ALL
            .into_iter()
            .map(|role| {
                let portal = match role {
                    Role::Administrator => "admin",
                    Role::HostelAuthority => "hostel",
                    other => other.as_str(),
                };
                (role, format!("/{portal}/dashboard"))
            })
            .collect();

        Self { paths, fallback: FALLBACK_PATH.to_owned() }
    }
}

impl RoleDashboardMap {
    pub fn new(paths: HashMap<Role, String>, fallback: impl Into<String>) -> Self {
        Self { paths, fallback: fallback.into() }
    }

    pub fn with_overrides(mut self, overrides: HashMap<Role, String>) -> Self {
        self.paths.extend(overrides);
        self
    }

    pub fn default_path_for(&self, role: Role) -> &str {
        match self.paths.get(&role) {
            Some(path) if !path.is_empty() => path,
            _ => {
                warn!(role = %role, fallback = %self.fallback, "no dashboard configured for role");
                &self.fallback
            }
        }
    }

    /// Same as [`Self::default_path_for`] for labels that have not been
    /// normalized yet.
    pub fn default_path_for_label(&self, label: &str) -> &str {
        match Role::normalize(label) {
            Some(role) => self.default_path_for(role),
            None => {
                warn!(label, fallback = %self.fallback, "dashboard requested for an unknown role label");
                &self.fallback
            }
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use maplit::hashmap;

    use super::{RoleDashboardMap, FALLBACK_PATH};
    use crate::role::Role;

    #[test]
    fn every_role_has_a_non_empty_default_path() {
        let dashboards = RoleDashboardMap::default();

        for role in Role::ALL {
            let path = dashboards.default_path_for(role);
            assert!(path.starts_with('/') && path.len() > 1, "{role} maps to '{path}'");
        }
        assert_eq!(dashboards.default_path_for(Role::Administrator), "/admin/dashboard");
        assert_eq!(dashboards.default_path_for(Role::HostelAuthority), "/hostel/dashboard");
        assert_eq!(dashboards.default_path_for(Role::Tnp), "/tnp/dashboard");
    }

    #[test]
    fn unknown_labels_resolve_to_the_fallback() {
        let dashboards = RoleDashboardMap::default();

        assert_eq!(dashboards.default_path_for_label("sports"), FALLBACK_PATH);
        assert_eq!(dashboards.default_path_for_label("admin"), "/admin/dashboard");
    }

    #[test]
    fn missing_or_empty_entries_resolve_to_the_fallback() {
        let dashboards = RoleDashboardMap::new(hashmap! { Role::Student => String::new() }, "/home");

        assert_eq!(dashboards.default_path_for(Role::Student), "/home");
        assert_eq!(dashboards.default_path_for(Role::Librarian), "/home");
    }

    #[test]
    fn overrides_replace_single_entries() {
        let dashboards = RoleDashboardMap::default()
            .with_overrides(hashmap! { Role::Librarian => "/library/home".to_owned() });

        assert_eq!(dashboards.default_path_for(Role::Librarian), "/library/home");
        assert_eq!(dashboards.default_path_for(Role::Student), "/student/dashboard");
        assert_eq!(RoleDashboardMap::default().with_overrides(HashMap::new()), RoleDashboardMap::default());
    }
}
