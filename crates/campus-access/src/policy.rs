//! Access rules as data. The route middleware and the page-level gate both read
//! from one [`PortalPolicy`].

use std::collections::{BTreeSet, HashMap};

use bon::Builder;

use crate::{dashboard::RoleDashboardMap, error::PolicyError, role::Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed_roles: BTreeSet<Role>,
    redirect_override: Option<String>,
}

impl AccessPolicy {
    pub fn new(
        allowed_roles: impl IntoIterator<Item = Role>,
        redirect_override: Option<String>,
    ) -> Result<Self, PolicyError> {
        let allowed_roles: BTreeSet<Role> = allowed_roles.into_iter().collect();
        if allowed_roles.is_empty() {
            return Err(PolicyError::EmptyRoleSet);
        }
        Ok(Self { allowed_roles, redirect_override })
    }

    pub fn allowed_roles(&self) -> &BTreeSet<Role> {
        &self.allowed_roles
    }

    pub fn redirect_override(&self) -> Option<&str> {
        self.redirect_override.as_deref()
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// Page-level override narrowing the roles allowed below `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePolicy {
    pub prefix: String,
    pub policy: AccessPolicy,
}

#[derive(Builder, Debug, Clone)]
pub struct PortalPolicy {
    #[builder(default)]
    dashboards: RoleDashboardMap,
    #[builder(default = default_role_prefixes())]
    role_prefixes: HashMap<Role, Vec<String>>,
    #[builder(default = vec!["/profile".to_owned()])]
    shared_prefixes: Vec<String>,
    #[builder(default = vec!["/".to_owned()])]
    public_paths: Vec<String>,
    #[builder(default = ["/login", "/auth/callback", "/api", "/health", "/static"].map(str::to_owned).to_vec())]
    public_prefixes: Vec<String>,
    #[builder(default = vec!["/".to_owned(), "/login".to_owned()])]
    login_paths: Vec<String>,
    #[builder(default = "/login".to_owned())]
    sign_in_path: String,
    #[builder(default = "/dashboard".to_owned())]
    dashboard_alias: String,
    #[builder(default = "/auth/first-login".to_owned())]
    setup_path: String,
    #[builder(default)]
    page_policies: Vec<PagePolicy>,
}

impl Default for PortalPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn default_role_prefixes() -> HashMap<Role, Vec<String>> {
    Role::ALL
        .into_iter()
        .map(|role| {
            let prefixes: &[&str] = match role {
                Role::Student => &["/student"],
                Role::Faculty => &["/faculty"],
                Role::Hod => &["/hod", "/faculty"],
                Role::Administrator => &["/admin"],
                Role::Accountant => &["/accountant"],
                Role::Librarian => &["/librarian"],
                Role::Tnp => &["/tnp"],
                Role::HostelAuthority => &["/hostel"],
            };
            (role, prefixes.iter().map(|prefix| (*prefix).to_owned()).collect())
        })
        .collect()
}

impl PortalPolicy {
    pub fn dashboards(&self) -> &RoleDashboardMap {
        &self.dashboards
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    pub fn dashboard_alias(&self) -> &str {
        &self.dashboard_alias
    }

    pub fn setup_path(&self) -> &str {
        &self.setup_path
    }

    pub fn default_path_for(&self, role: Role) -> &str {
        self.dashboards.default_path_for(role)
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.public_paths.iter().any(|public| normalize_path(public) == path)
            || self.public_prefixes.iter().any(|prefix| has_prefix(path, prefix))
    }

    pub fn is_login_path(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.login_paths.iter().any(|login| normalize_path(login) == path)
    }

    pub fn is_setup_path(&self, path: &str) -> bool {
        normalize_path(path) == normalize_path(&self.setup_path)
    }

    /// Whether `role` may open `path` at all. The setup path is always allowed so
    /// the first-login redirect cannot loop.
    pub fn role_allows(&self, role: Role, path: &str) -> bool {
        let path = normalize_path(path);
        self.is_setup_path(path)
            || self.shared_prefixes.iter().any(|prefix| has_prefix(path, prefix))
            || self
                .role_prefixes
                .get(&role)
                .is_some_and(|prefixes| prefixes.iter().any(|prefix| has_prefix(path, prefix)))
    }

    /// Whether the route middleware lets `role` through to `path`. A page
    /// override that admits the role wins over the prefixes. Roles the override
    /// leaves out but the prefixes cover still pass here and get the restriction
    /// notice from the page gate.
    pub fn admits(&self, role: Role, path: &str) -> bool {
        self.role_allows(role, path) || self.page_override(path).is_some_and(|page| page.policy.allows(role))
    }

    pub fn roles_for_path(&self, path: &str) -> BTreeSet<Role> {
        Role::ALL.into_iter().filter(|role| self.role_allows(*role, path)).collect()
    }

    /// Policy of the page at `path`: the most specific page override, otherwise
    /// the roles whose prefixes cover the path. `None` for paths no role owns.
    pub fn page_policy(&self, path: &str) -> Option<AccessPolicy> {
        match self.page_override(path) {
            Some(page) => Some(page.policy.clone()),
            None => AccessPolicy::new(self.roles_for_path(path), None).ok(),
        }
    }

    fn page_override(&self, path: &str) -> Option<&PagePolicy> {
        let path = normalize_path(path);
        self.page_policies
            .iter()
            .filter(|page| has_prefix(path, &page.prefix))
            .max_by_key(|page| normalize_path(&page.prefix).len())
    }
}

pub(crate) fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Prefix match on whole path segments: `/admin` covers `/admin/users` but not
/// `/administrator`.
pub(crate) fn has_prefix(path: &str, prefix: &str) -> bool {
    let path = normalize_path(path);
    let prefix = normalize_path(prefix);
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use super::{has_prefix, AccessPolicy, PagePolicy, PortalPolicy};
    use crate::{error::PolicyError, role::Role};

    #[test]
    fn empty_role_set_is_rejected() {
        assert_eq!(AccessPolicy::new(Vec::<Role>::new(), None), Err(PolicyError::EmptyRoleSet));
    }

    #[test]
    fn prefixes_match_whole_segments() {
        assert!(has_prefix("/admin", "/admin"));
        assert!(has_prefix("/admin/users/", "/admin"));
        assert!(!has_prefix("/administrator", "/admin"));
        assert!(has_prefix("/anything", "/"));
    }

    #[test]
    fn public_paths_match_exactly_and_public_prefixes_by_segment() {
        let policy = PortalPolicy::default();

        assert!(policy.is_public("/"));
        assert!(policy.is_public("/login"));
        assert!(policy.is_public("/api/auth/sign-in"));
        assert!(policy.is_public("/auth/callback/hosted"));
        assert!(!policy.is_public("/student/dashboard"));
        assert!(!policy.is_public("/auth/first-login"));
    }

    #[test]
    fn setup_and_shared_paths_are_allowed_for_every_role() {
        let policy = PortalPolicy::default();

        for role in Role::ALL {
            assert!(policy.role_allows(role, "/auth/first-login"));
            assert!(policy.role_allows(role, "/profile/edit"));
        }
    }

    #[test]
    fn derived_page_policy_lists_roles_owning_the_prefix() {
        let policy = PortalPolicy::default();

        let faculty_page = policy.page_policy("/faculty/attendance").expect("faculty pages are owned");
        assert_eq!(faculty_page.allowed_roles(), &BTreeSet::from([Role::Faculty, Role::Hod]));

        let admin_page = policy.page_policy("/admin/users").expect("admin pages are owned");
        assert_eq!(admin_page.allowed_roles(), &BTreeSet::from([Role::Administrator]));

        assert_eq!(policy.page_policy("/nowhere"), None);
    }

    #[test]
    fn most_specific_page_override_wins() {
        let policy = PortalPolicy::builder()
            .page_policies(vec![
                PagePolicy {
                    prefix: "/faculty".to_owned(),
                    policy: AccessPolicy::new([Role::Faculty, Role::Hod], None).unwrap(),
                },
                PagePolicy {
                    prefix: "/faculty/approvals".to_owned(),
                    policy: AccessPolicy::new([Role::Hod], Some("/hod/dashboard".to_owned())).unwrap(),
                },
            ])
            .build();

        let page = policy.page_policy("/faculty/approvals/leave").expect("override should apply");
        assert_eq!(page.allowed_roles(), &BTreeSet::from([Role::Hod]));
        assert_eq!(page.redirect_override(), Some("/hod/dashboard"));
    }

    #[test]
    fn every_role_a_page_allows_is_admitted_by_the_middleware_check() {
        let policy = PortalPolicy::builder()
            .page_policies(vec![
                PagePolicy {
                    prefix: "/accountant/fee-reports".to_owned(),
                    policy: AccessPolicy::new([Role::Accountant, Role::Administrator], None).unwrap(),
                },
                PagePolicy {
                    prefix: "/faculty/leave-approvals".to_owned(),
                    policy: AccessPolicy::new([Role::Hod], None).unwrap(),
                },
            ])
            .build();

        for path in ["/accountant/fee-reports", "/faculty/leave-approvals/7", "/admin/users", "/student/dashboard"] {
            let page = policy.page_policy(path).expect("every path here is owned");
            for role in Role::ALL {
                if page.allows(role) {
                    assert!(policy.admits(role, path), "{role} should reach {path}");
                }
            }
        }
        assert!(policy.admits(Role::Administrator, "/accountant/fee-reports"));
        assert!(!policy.admits(Role::Administrator, "/accountant/ledger"));
        assert!(!policy.admits(Role::Student, "/accountant/fee-reports"));
    }
}
