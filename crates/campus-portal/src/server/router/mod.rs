use campus_access::{Identity, Role};
use serde::Serialize;

pub(crate) mod auth;
pub(crate) mod login;
pub(crate) mod page;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IdentityResponse {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub role_label: &'static str,
    pub display_name: String,
    pub is_first_login: bool,
}

impl From<&Identity> for IdentityResponse {
    fn from(value: &Identity) -> Self {
        Self {
            id: value.id.clone(),
            email: value.email.clone(),
            role: value.role,
            role_label: value.role.label(),
            display_name: value.display_name(),
            is_first_login: value.is_first_login(),
        }
    }
}
