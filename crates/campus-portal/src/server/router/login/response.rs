use campus_access::Role;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoginPageResponse {
    pub roles: Vec<RoleOption>,
    pub demo_mode: bool,
    pub sign_in_endpoint: &'static str,
}

#[derive(Serialize)]
pub(super) struct RoleOption {
    pub value: Role,
    pub label: &'static str,
}
