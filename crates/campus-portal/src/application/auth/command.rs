use campus_access::SessionTokens;

pub(crate) struct SigningInCommand {
    pub email: String,
    pub password: String,
    /// Role label chosen on the login form.
    pub role: Option<String>,
}

pub(crate) struct CompletingFirstLoginCommand {
    pub tokens: Option<SessionTokens>,
    pub new_password: String,
}
