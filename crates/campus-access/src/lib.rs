pub mod dashboard;
pub mod error;
pub mod gate;
pub mod identity;
pub mod layer;
pub mod policy;
pub mod resolver;
pub mod role;
pub mod route;
pub mod session;

pub use dashboard::RoleDashboardMap;
pub use gate::{AccessGate, GateAction, GateState, RestrictionNotice};
pub use identity::{CurrentIdentity, Identity, Profile};
pub use policy::{AccessPolicy, PagePolicy, PortalPolicy};
pub use resolver::{IdentityCell, IdentityResolver, ProfileFallback, ResolverOptions, SessionTokens};
pub use role::Role;
pub use route::RouteDecision;
