//! Page-level access gate.
//!
//! The gate is a small state machine driven by two inputs: identity updates and
//! elapsed time. It starts in [`GateState::Resolving`], settles into one of
//! `Unauthenticated`, `Authorized` or `Forbidden`, and tells its host what to do
//! through the returned [`GateAction`].

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::{identity::Identity, policy::AccessPolicy, policy::PortalPolicy, role::Role};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionNotice {
    pub allowed_roles: Vec<Role>,
    pub actual_role: Role,
    pub message: String,
    pub redirect_to: String,
    pub grace_period_secs: u64,
}

impl RestrictionNotice {
    fn new(policy: &AccessPolicy, actual_role: Role, redirect_to: String, grace_period: Duration) -> Self {
        let allowed_roles: Vec<Role> = policy.allowed_roles().iter().copied().collect();
        let allowed = allowed_roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ");

        Self {
            message: format!("This page is available to {allowed} users only. You are signed in as {actual_role}."),
            allowed_roles,
            actual_role,
            redirect_to,
            grace_period_secs: grace_period.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Resolving,
    Unauthenticated,
    Authorized,
    Forbidden { notice: RestrictionNotice, remaining: Duration, redirected: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    ShowLoading,
    Render,
    ShowNotice(RestrictionNotice),
    Redirect(String),
    Nothing,
}

pub struct AccessGate<'a> {
    policy: AccessPolicy,
    portal: &'a PortalPolicy,
    grace_period: Duration,
    state: GateState,
}

impl<'a> AccessGate<'a> {
    pub fn new(policy: AccessPolicy, portal: &'a PortalPolicy, grace_period: Duration) -> Self {
        Self { policy, portal, grace_period, state: GateState::Resolving }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Feeds the outcome of an identity resolution. Unauthenticated and Forbidden
    /// are terminal and ignore further updates.
    pub fn observe(&mut self, identity: Option<&Identity>) -> GateAction {
        match self.state {
            GateState::Unauthenticated | GateState::Forbidden { .. } => return GateAction::Nothing,
            GateState::Resolving | GateState::Authorized => {}
        }

        match identity {
            None => {
                self.state = GateState::Unauthenticated;
                GateAction::Redirect(self.portal.sign_in_path().to_owned())
            }
            Some(identity) if self.policy.allows(identity.role) => {
                self.state = GateState::Authorized;
                GateAction::Render
            }
            Some(identity) => {
                let redirect_to = self
                    .policy
                    .redirect_override()
                    .unwrap_or_else(|| self.portal.default_path_for(identity.role))
                    .to_owned();
                let notice = RestrictionNotice::new(&self.policy, identity.role, redirect_to, self.grace_period);
                debug!(role = %identity.role, redirect_to = %notice.redirect_to, "page access restricted");

                self.state =
                    GateState::Forbidden { notice: notice.clone(), remaining: self.grace_period, redirected: false };
                GateAction::ShowNotice(notice)
            }
        }
    }

    /// An externally triggered re-fetch, for example after a token refresh.
    pub fn begin_resolving(&mut self) -> GateAction {
        match self.state {
            GateState::Resolving | GateState::Authorized => {
                self.state = GateState::Resolving;
                GateAction::ShowLoading
            }
            _ => GateAction::Nothing,
        }
    }

    /// Advances the grace-period timer of the Forbidden state.
    pub fn tick(&mut self, elapsed: Duration) -> GateAction {
        if let GateState::Forbidden { ref notice, ref mut remaining, ref mut redirected } = self.state {
            if *redirected {
                return GateAction::Nothing;
            }
            *remaining = remaining.saturating_sub(elapsed);
            if remaining.is_zero() {
                *redirected = true;
                return GateAction::Redirect(notice.redirect_to.clone());
            }
        }
        GateAction::Nothing
    }

    /// The "Go to Dashboard" action of the restriction notice.
    pub fn redirect_now(&mut self) -> GateAction {
        let remaining = match self.state {
            GateState::Forbidden { remaining, .. } => remaining,
            _ => return GateAction::Nothing,
        };
        self.tick(remaining)
    }
}
