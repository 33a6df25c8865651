use serde::Deserialize;

#[derive(Deserialize)]
pub(super) struct SignInRequest {
    pub email: String,
    pub password: String,
    /// Role label selected on the login form.
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CompleteFirstLoginRequest {
    pub new_password: String,
}
