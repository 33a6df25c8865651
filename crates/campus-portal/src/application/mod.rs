use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use campus_access::{
    layer::PortalAccessLayer,
    session::{default_demo_accounts, hosted::DEFAULT_PROFILE_TABLE, DemoSessionStore, HostedSessionStore, SessionStore},
    AccessPolicy, PagePolicy, PortalPolicy, ResolverOptions, Role, RoleDashboardMap,
};
use tracing::{info, warn};

use crate::config::{AccessConfig, ApplicationConfig, PageConfig};

use self::{
    auth::{AuthUseCase, AuthUseCaseImpl},
    page::{PageUseCase, PageUseCaseImpl},
};

pub(crate) mod auth;
pub(crate) mod page;

pub(crate) struct Application {
    session_store: Arc<dyn SessionStore>,
    policy: Arc<PortalPolicy>,
    resolver_options: ResolverOptions,
    grace_period: Duration,
    demo_mode: bool,
}

impl Application {
    pub fn new(config: &ApplicationConfig) -> anyhow::Result<Self> {
        let (session_store, demo_mode) = init_session_store(config);
        let policy = init_portal_policy(&config.access)?;
        let resolver_options = ResolverOptions::builder()
            .settle_attempts(config.identity.settle_attempts)
            .settle_backoff(Duration::from_millis(config.identity.settle_backoff_ms))
            .profile_fallback(config.identity.profile_fallback)
            .build();

        Ok(Self::from_parts(
            session_store,
            Arc::new(policy),
            resolver_options,
            Duration::from_secs(config.access.grace_period_secs),
            demo_mode,
        ))
    }

    pub fn from_parts(
        session_store: Arc<dyn SessionStore>,
        policy: Arc<PortalPolicy>,
        resolver_options: ResolverOptions,
        grace_period: Duration,
        demo_mode: bool,
    ) -> Self {
        Self { session_store, policy, resolver_options, grace_period, demo_mode }
    }

    pub fn auth(&self) -> impl AuthUseCase {
        AuthUseCaseImpl::new(self.session_store.clone(), self.policy.clone(), self.resolver_options.clone())
    }

    pub fn page(&self) -> impl PageUseCase {
        PageUseCaseImpl::new(self.policy.clone(), self.grace_period)
    }

    pub fn access_layer(&self) -> PortalAccessLayer {
        PortalAccessLayer::builder()
            .store(self.session_store.clone())
            .policy(self.policy.clone())
            .options(self.resolver_options.clone())
            .build()
    }

    pub fn policy(&self) -> &PortalPolicy {
        &self.policy
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }
}

fn init_session_store(config: &ApplicationConfig) -> (Arc<dyn SessionStore>, bool) {
    if let Some((url, key)) = config.session_store.hosted() {
        let profile_table = config.session_store.profile_table.as_deref().unwrap_or(DEFAULT_PROFILE_TABLE);
        info!(%url, profile_table, "using hosted session store");
        return (Arc::new(HostedSessionStore::new(url.clone(), key, profile_table)), false);
    }

    if !config.session_store.demo_mode {
        warn!("session store url or key missing, falling back to demo accounts");
    }
    let accounts = config.demo_accounts.clone().unwrap_or_else(default_demo_accounts);
    let store = match config.session_store.session_lifetime_secs {
        Some(secs) => DemoSessionStore::with_session_lifetime(accounts, chrono::Duration::seconds(secs)),
        None => DemoSessionStore::new(accounts),
    };
    info!("using demo session store");
    (Arc::new(store), true)
}

fn init_portal_policy(config: &AccessConfig) -> anyhow::Result<PortalPolicy> {
    let dashboard_overrides = config
        .dashboards
        .iter()
        .map(|(label, path)| Ok((parse_role(label)?, path.to_owned())))
        .collect::<anyhow::Result<HashMap<_, _>>>()?;
    let page_policies = config.pages.iter().map(init_page_policy).collect::<anyhow::Result<Vec<_>>>()?;

    Ok(PortalPolicy::builder()
        .dashboards(RoleDashboardMap::default().with_overrides(dashboard_overrides))
        .page_policies(page_policies)
        .build())
}

fn init_page_policy(page: &PageConfig) -> anyhow::Result<PagePolicy> {
    let roles = page.roles.iter().map(|label| parse_role(label)).collect::<anyhow::Result<Vec<_>>>()?;
    let policy = AccessPolicy::new(roles, page.redirect_to.clone())
        .with_context(|| format!("invalid access policy for page '{}'", page.prefix))?;

    Ok(PagePolicy { prefix: page.prefix.clone(), policy })
}

fn parse_role(label: &str) -> anyhow::Result<Role> {
    Role::normalize(label).ok_or_else(|| anyhow!("unknown role '{label}' in access configuration"))
}


#[cfg(test)]
mod test {
    use maplit::hashmap;

    use super::{init_portal_policy, init_session_store};
    use crate::config::{AccessConfig, ApplicationConfig, PageConfig, SessionStoreConfig};
    use campus_access::Role;

    fn application_config(session_store: SessionStoreConfig) -> ApplicationConfig {
        ApplicationConfig {
            port: 3000,
            session_store,
            identity: Default::default(),
            access: Default::default(),
            demo_accounts: None,
            log: Default::default(),
        }
    }

    #[test]
    fn portal_policy_takes_dashboards_and_pages_from_config() {
        let config = AccessConfig {
            grace_period_secs: 3,
            dashboards: hashmap! { "warden".to_owned() => "/hostel/overview".to_owned() },
            pages: vec![PageConfig {
                prefix: "/faculty/leave-approvals".to_owned(),
                roles: vec!["hod".to_owned()],
                redirect_to: None,
            }],
        };

        let policy = init_portal_policy(&config).expect("policy should build");

        assert_eq!(policy.default_path_for(Role::HostelAuthority), "/hostel/overview");
        let page = policy.page_policy("/faculty/leave-approvals/42").expect("page should be known");
        assert!(page.allows(Role::Hod));
        assert!(!page.allows(Role::Faculty));
    }

    #[test]
    fn unknown_roles_and_empty_pages_are_rejected() {
        let unknown = AccessConfig {
            dashboards: hashmap! { "sports".to_owned() => "/sports/dashboard".to_owned() },
            ..Default::default()
        };
        let empty = AccessConfig {
            pages: vec![PageConfig { prefix: "/tnp/drives".to_owned(), roles: vec![], redirect_to: None }],
            ..Default::default()
        };

        assert!(init_portal_policy(&unknown).is_err());
        assert!(init_portal_policy(&empty).is_err());
    }

    #[test]
    fn missing_key_selects_the_demo_store() {
        let config = application_config(SessionStoreConfig {
            url: Some("https://project.example.com".parse().unwrap()),
            ..Default::default()
        });

        let (_, demo_mode) = init_session_store(&config);

        assert!(demo_mode);
    }

    #[test]
    fn url_and_key_select_the_hosted_store() {
        let config = application_config(SessionStoreConfig {
            url: Some("https://project.example.com".parse().unwrap()),
            key: Some("anon".to_owned()),
            ..Default::default()
        });

        let (_, demo_mode) = init_session_store(&config);

        assert!(!demo_mode);
    }
}
