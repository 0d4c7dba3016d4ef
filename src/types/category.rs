use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Category {
    /// A placeholder for a category known only by id.
    pub fn from_id(id: u64) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
        }
    }

    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            format!("#{}", self.id)
        } else {
            self.name.clone()
        }
    }
}
