use std::fmt;

use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::User;

/// Coarse role derived from profile data. Never taken from the server as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superuser,
}

impl Role {
    /// True for both admins and superusers.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::Superuser)
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superuser => "superuser",
        }
    }

    pub fn colored(self) -> String {
        match self {
            Role::User => self.label().to_string(),
            Role::Admin => self.label().cyan().to_string(),
            Role::Superuser => self.label().magenta().bold().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Derive a role from a user record. The profile label wins when present;
/// the permissions list is only consulted without one.
pub fn classify_role(user: &User) -> Role {
    classify(user.profile_name(), user.permissions.as_deref())
}

fn classify(profile_name: Option<&str>, permissions: Option<&[String]>) -> Role {
    if let Some(name) = profile_name {
        return match name.to_lowercase().as_str() {
            "superuser" => Role::Superuser,
            "administrador" | "admin" => Role::Admin,
            _ => Role::User,
        };
    }

    if let Some(permissions) = permissions {
        if permissions.iter().any(|p| p == "superuser") {
            return Role::Superuser;
        }
        if permissions.iter().any(|p| p == "admin") {
            return Role::Admin;
        }
    }

    Role::User
}
