use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::RoleError;

/// Canonical portal roles. UI labels such as `admin` or `hostel` are folded into
/// these by [`Role::normalize`] and never travel further than the parser.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Student,
    Faculty,
    Hod,
    Administrator,
    Accountant,
    Librarian,
    Tnp,
    HostelAuthority,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Student,
        Role::Faculty,
        Role::Hod,
        Role::Administrator,
        Role::Accountant,
        Role::Librarian,
        Role::Tnp,
        Role::HostelAuthority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Hod => "hod",
            Role::Administrator => "administrator",
            Role::Accountant => "accountant",
            Role::Librarian => "librarian",
            Role::Tnp => "tnp",
            Role::HostelAuthority => "hostel_authority",
        }
    }

    /// Human readable label for login forms.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Faculty => "Faculty",
            Role::Hod => "Head of Department",
            Role::Administrator => "Administrator",
            Role::Accountant => "Accountant",
            Role::Librarian => "Librarian",
            Role::Tnp => "Training & Placement",
            Role::HostelAuthority => "Hostel Authority",
        }
    }

    /// Maps a canonical name or a known UI alias to its canonical role.
    pub fn normalize(label: &str) -> Option<Role> {
        let key = label.trim().to_ascii_lowercase().replace(|c: char| c == '-' || c == ' ', "_");

        match key.as_str() {
            "student" => Some(Role::Student),
            "faculty" | "teacher" => Some(Role::Faculty),
            "hod" | "head_of_department" => Some(Role::Hod),
            "administrator" | "admin" => Some(Role::Administrator),
            "accountant" | "accounts" => Some(Role::Accountant),
            "librarian" | "library" => Some(Role::Librarian),
            "tnp" | "t&p" | "placement" | "training_and_placement" => Some(Role::Tnp),
            "hostel_authority" | "hostel" | "warden" => Some(Role::HostelAuthority),
            _ => None,
        }
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::normalize(s).ok_or_else(|| RoleError::Unknown(s.to_owned()))
    }
}

impl TryFrom<String> for Role {
    type Error = RoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_owned()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
