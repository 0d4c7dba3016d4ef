use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelpdeskError {
    /// Rejected locally before any request was built.
    #[error("{0}")]
    GuardViolation(String),

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    ValidationFailed { message: String, errors: FieldErrors },

    #[error("Cannot connect to server: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Server unavailable (status {status}): {message}")]
    ServerUnavailable { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request rejected: {message}")]
    Envelope { message: String },

    #[error("Empty response from API")]
    EmptyResponse,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Not logged in. Run `helpdesk login` first")]
    NotAuthenticated,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Attachment rejected: {0}")]
    Upload(String),

    #[error("Failed to persist session at {path}: {message}")]
    Session { path: PathBuf, message: String },
}

impl HelpdeskError {
    pub fn guard(message: impl Into<String>) -> Self {
        HelpdeskError::GuardViolation(message.into())
    }

    /// Connectivity loss or a 5xx; only idempotent requests may be retried on these.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HelpdeskError::Network(_) | HelpdeskError::ServerUnavailable { .. }
        )
    }

    pub fn is_guard_violation(&self) -> bool {
        matches!(self, HelpdeskError::GuardViolation(_))
    }
}

impl From<reqwest::Error> for HelpdeskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            HelpdeskError::Network(err)
        } else {
            HelpdeskError::Http(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, HelpdeskError>;

/// Server-side validation messages keyed by form field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Accepts `{"field": ["msg", ...]}` as well as `{"field": "msg"}`.
    /// Indexed keys like `attachments.0` fold into their form field.
    pub fn from_value(value: &Value) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if let Value::Object(map) = value {
            for (key, messages) in map {
                let entry = fields.entry(form_field(key)).or_default();
                match messages {
                    Value::Array(items) => entry.extend(
                        items
                            .iter()
                            .filter_map(|m| m.as_str())
                            .map(String::from),
                    ),
                    Value::String(message) => entry.push(message.clone()),
                    _ => {}
                }
            }
        }

        fields.retain(|_, messages| !messages.is_empty());
        Self(fields)
    }

    pub fn for_field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All messages joined, for when no form field can show them.
    pub fn general(&self) -> String {
        self.0
            .values()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn form_field(key: &str) -> String {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    let re = FIELD.get_or_init(|| Regex::new(r"^([^.\[\]]+)").expect("field key pattern is valid"));

    re.captures(key)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_errors_fold_indexed_keys() {
        let errors = FieldErrors::from_value(&json!({
            "attachments.0": ["The file is too large."],
            "attachments[1]": ["Unsupported type."],
            "title": "The title field is required."
        }));

        assert_eq!(errors.for_field("attachments").len(), 2);
        assert_eq!(
            errors.for_field("title"),
            &["The title field is required.".to_string()]
        );
        assert!(errors.for_field("description").is_empty());
    }

    #[test]
    fn test_field_errors_general_message() {
        let errors = FieldErrors::from_value(&json!({ "body": ["Required."], "email": ["Taken."] }));
        assert_eq!(errors.general(), "Required.; Taken.");
    }

    #[test]
    fn test_field_errors_ignore_malformed() {
        assert!(FieldErrors::from_value(&json!(["oops"])).is_empty());
        assert!(FieldErrors::from_value(&json!({ "title": 3 })).is_empty());
    }

    #[test]
    fn test_transient_classification() {
        let unavailable = HelpdeskError::ServerUnavailable {
            status: 503,
            message: "down".into(),
        };
        assert!(unavailable.is_transient());
        assert!(!HelpdeskError::guard("nope").is_transient());
        assert!(HelpdeskError::guard("nope").is_guard_violation());
        assert!(!HelpdeskError::Forbidden {
            message: "no".into()
        }
        .is_transient());
    }
}
