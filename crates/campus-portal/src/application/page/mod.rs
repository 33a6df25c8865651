use std::{sync::Arc, time::Duration};

use campus_access::{AccessGate, GateAction, Identity, PortalPolicy, RestrictionNotice, Role};
use tracing::debug;

pub(crate) enum PageOutcome {
    Render(PageData),
    Restricted(RestrictionNotice),
    SignInRequired(String),
    NotFound,
}

pub(crate) struct PageData {
    pub path: String,
    pub allowed_roles: Vec<Role>,
    pub identity: Identity,
}

pub(crate) trait PageUseCase {
    fn open(&self, path: &str, identity: Option<&Identity>) -> PageOutcome;
}

pub(crate) struct PageUseCaseImpl {
    policy: Arc<PortalPolicy>,
    grace_period: Duration,
}

impl PageUseCaseImpl {
    pub fn new(policy: Arc<PortalPolicy>, grace_period: Duration) -> Self {
        Self { policy, grace_period }
    }
}

impl PageUseCase for PageUseCaseImpl {
    fn open(&self, path: &str, identity: Option<&Identity>) -> PageOutcome {
        let Some(page_policy) = self.policy.page_policy(path) else {
            debug!(path, "no portal owns this page");
            return PageOutcome::NotFound;
        };
        let allowed_roles = page_policy.allowed_roles().iter().copied().collect();

        let mut gate = AccessGate::new(page_policy, &self.policy, self.grace_period);
        match (gate.observe(identity), identity) {
            (GateAction::Render, Some(identity)) => {
                PageOutcome::Render(PageData { path: path.to_owned(), allowed_roles, identity: identity.clone() })
            }
            (GateAction::ShowNotice(notice), _) => PageOutcome::Restricted(notice),
            (GateAction::Redirect(target), _) => PageOutcome::SignInRequired(target),
            _ => PageOutcome::SignInRequired(self.policy.sign_in_path().to_owned()),
        }
    }
}

#[cfg(test)]
mod test {
    use campus_access::{Identity, Role};

    use super::{PageOutcome, PageUseCase};
    use crate::application::test_support::application;

    fn identity(role: Role) -> Identity {
        Identity { id: format!("{role}-1"), email: format!("{role}@college.edu"), role, profile: None }
    }

    #[test]
    fn when_role_is_allowed_page_should_render() {
        let application = application();

        let outcome = application.page().open("/faculty/leave-approvals", Some(&identity(Role::Hod)));

        assert!(matches!(outcome, PageOutcome::Render(data) if data.allowed_roles == vec![Role::Hod]));
    }

    #[test]
    fn when_role_is_not_allowed_page_should_return_restriction_notice() {
        let application = application();

        let outcome = application.page().open("/faculty/leave-approvals", Some(&identity(Role::Faculty)));

        let PageOutcome::Restricted(notice) = outcome else {
            panic!("faculty should be restricted from the approvals page");
        };
        assert_eq!(notice.redirect_to, "/faculty/dashboard");
        assert_eq!(notice.actual_role, Role::Faculty);
        assert_eq!(notice.grace_period_secs, 3);
    }

    #[test]
    fn when_nobody_is_signed_in_page_should_require_sign_in() {
        let application = application();

        let outcome = application.page().open("/student/dashboard", None);

        assert!(matches!(outcome, PageOutcome::SignInRequired(target) if target == "/login"));
    }

    #[test]
    fn when_no_portal_owns_the_path_page_should_be_not_found() {
        let application = application();

        let outcome = application.page().open("/sports/dashboard", Some(&identity(Role::Student)));

        assert!(matches!(outcome, PageOutcome::NotFound));
    }
}
