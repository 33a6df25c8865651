use campus_access::{Identity, SessionTokens};

pub(crate) struct SignedInData {
    pub identity: Identity,
    pub tokens: SessionTokens,
    pub redirect_to: String,
}
