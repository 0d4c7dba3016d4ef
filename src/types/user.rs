use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire::{id_of, lenient_id, lenient_strings};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_profile: Option<ProfileField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileField>,
    #[serde(
        default,
        deserialize_with = "lenient_strings",
        skip_serializing_if = "Option::is_none"
    )]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

impl User {
    /// First usable label: name, full name, username, then email.
    pub fn display_name(&self) -> Option<&str> {
        [&self.name, &self.full_name, &self.username, &self.email]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// The free-text profile label, from `my_profile` or else `profile`.
    pub fn profile_name(&self) -> Option<&str> {
        self.my_profile
            .as_ref()
            .and_then(ProfileField::name)
            .or_else(|| self.profile.as_ref().and_then(ProfileField::name))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Profile {
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// The backend sends the profile as an object, occasionally as a bare label,
/// and sometimes as something else entirely.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ProfileField {
    Object(Profile),
    Label(String),
    Other(Value),
}

impl ProfileField {
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            ProfileField::Object(profile) => profile.name.as_deref(),
            ProfileField::Label(label) => Some(label.as_str()),
            ProfileField::Other(_) => None,
        };
        name.map(str::trim).filter(|n| !n.is_empty())
    }
}

/// A user reference that arrives either as a bare id or an embedded object.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum UserRef {
    Id(u64),
    Embedded(User),
}

impl UserRef {
    /// Normalizes the raw field; `null`, empty objects and garbage become `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => serde_json::from_value::<User>(value.clone())
                .ok()
                .map(UserRef::Embedded)
                .or_else(|| value.get("id").and_then(id_of).map(UserRef::Id)),
            other => id_of(other).map(UserRef::Id),
        }
    }

    /// Prefers an embedded object over a bare id when both forms are present.
    pub fn normalize(primary: Option<&Value>, secondary: Option<&Value>) -> Option<Self> {
        let primary = primary.and_then(Self::from_value);
        let secondary = secondary.and_then(Self::from_value);
        match (primary, secondary) {
            (Some(embedded @ UserRef::Embedded(_)), _) => Some(embedded),
            (_, Some(embedded @ UserRef::Embedded(_))) => Some(embedded),
            (primary, secondary) => primary.or(secondary),
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            UserRef::Id(id) => *id,
            UserRef::Embedded(user) => user.id,
        }
    }
}
