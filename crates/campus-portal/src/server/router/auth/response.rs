use campus_access::Role;
use serde::Serialize;

use crate::{application::auth::data::SignedInData, server::router::IdentityResponse};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SignedInResponse {
    pub identity: IdentityResponse,
    pub redirect_to: String,
}

impl From<SignedInData> for SignedInResponse {
    fn from(value: SignedInData) -> Self {
        Self { identity: IdentityResponse::from(&value.identity), redirect_to: value.redirect_to }
    }
}

#[derive(Serialize, Debug)]
pub(super) struct RoleMismatchData {
    pub expected: Role,
    pub actual: Role,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct WeakPasswordData {
    pub min_length: usize,
}
