use serde::{Deserialize, Serialize};

use super::{default_true, double_option};

/// An organization unit. Users join groups; groups carry roles and direct grants.
///
/// Groups form a forest via `superior_id`. The hierarchy is only used for
/// listing; it does not take part in privilege resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Unique group name.
    pub name: String,

    /// Parent group id (None = top-level).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a new group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    #[serde(default)]
    pub superior_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModifyGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub superior_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl Group {
    pub fn apply(&mut self, patch: ModifyGroup) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(superior_id) = patch.superior_id {
            self.superior_id = superior_id;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
    }
}

/// A node of the group forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNode {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GroupNode>,
}

impl From<Group> for GroupNode {
    fn from(group: Group) -> Self {
        GroupNode {
            id: group.id,
            name: group.name,
            superior_id: group.superior_id,
            description: group.description,
            enabled: group.enabled,
            children: Vec::new(),
        }
    }
}
