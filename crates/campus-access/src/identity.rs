use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::RoleError,
    role::Role,
    session::{ProfileRow, Session},
};

pub const FIRST_LOGIN_ATTRIBUTE: &str = "is_first_login";
pub const DISPLAY_NAME_ATTRIBUTE: &str = "display_name";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Profile(Map<String, Value>);

impl Profile {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_first_login(&self) -> bool {
        self.get(FIRST_LOGIN_ATTRIBUTE).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.get_str("full_name").or_else(|| self.get_str(DISPLAY_NAME_ATTRIBUTE)) {
            return Some(name.to_owned());
        }
        match (self.get_str("first_name"), self.get_str("last_name")) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.to_owned()),
            _ => self.get_str("name").map(str::to_owned),
        }
    }
}

/// The signed-in user as every access decision sees it.
#[derive(Serialize, Clone, Debug)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub profile: Option<Profile>,
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}

impl Identity {
    pub fn from_profile_row(session: &Session, row: ProfileRow) -> Result<Self, RoleError> {
        let role = row.role.parse::<Role>()?;

        let mut attributes = row.attributes;
        attributes.insert(FIRST_LOGIN_ATTRIBUTE.to_owned(), Value::Bool(row.is_first_login));

        Ok(Self {
            id: session.user_id.clone(),
            email: row.email.unwrap_or_else(|| session.email.clone()),
            role,
            profile: Some(Profile::new(attributes)),
        })
    }

    /// Identity built from the session alone, used only when the profile
    /// fallback is configured as `minimal`.
    pub fn minimal(session: &Session) -> Self {
        let mut attributes = Map::new();
        attributes.insert(DISPLAY_NAME_ATTRIBUTE.to_owned(), Value::String(email_local_part(&session.email)));

        Self {
            id: session.user_id.clone(),
            email: session.email.clone(),
            role: Role::Student,
            profile: Some(Profile::new(attributes)),
        }
    }

    pub fn is_first_login(&self) -> bool {
        self.profile.as_ref().is_some_and(Profile::is_first_login)
    }

    pub fn display_name(&self) -> String {
        self.profile.as_ref().and_then(Profile::display_name).unwrap_or_else(|| email_local_part(&self.email))
    }
}

fn email_local_part(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_owned()
}

/// Request extension carrying the identity resolved by the access layer.
#[derive(Clone, Debug, Default)]
pub struct CurrentIdentity(pub Option<Identity>);
