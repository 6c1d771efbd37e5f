use serde::{Deserialize, Serialize};

use super::{default_true, double_option};

/// A lookup value. Top-level entries are categories; their children are the values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    pub id: String,

    /// Unique among siblings sharing the same `superior_id`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDictionary {
    pub name: String,
    #[serde(default)]
    pub superior_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModifyDictionary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl Dictionary {
    pub fn apply(&mut self, patch: ModifyDictionary) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
    }
}
