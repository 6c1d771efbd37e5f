use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{default_true, double_option};

/// A navigable resource / menu node that can be granted to roles and groups.
///
/// Privileges form a forest through `superior_id`. A dangling `superior_id`
/// is tolerated: tree views treat such a privilege as a root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Privilege {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Unique name. Also the stem of every authority derived from this privilege.
    pub name: String,

    /// Parent privilege id (None = top-level).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<String>,

    /// Route path rendered by the admin UI.
    #[serde(default)]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Disabled privileges never appear in a resolved tree.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

/// Input for creating a new privilege.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePrivilege {
    pub name: String,
    #[serde(default)]
    pub superior_id: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update for a privilege. Absent fields are left untouched;
/// an explicit `null` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModifyPrivilege {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub superior_id: Option<Option<String>>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub redirect: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub component: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl Privilege {
    pub fn apply(&mut self, patch: ModifyPrivilege) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(superior_id) = patch.superior_id {
            self.superior_id = superior_id;
        }
        if let Some(path) = patch.path {
            self.path = path;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        if let Some(redirect) = patch.redirect {
            self.redirect = redirect;
        }
        if let Some(component) = patch.component {
            self.component = component;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
    }
}

/// A privilege together with the actions one user holds on it.
///
/// Produced per request by the resolver; the stored [`Privilege`] never
/// carries actions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrivilege {
    pub privilege: Privilege,
    pub actions: BTreeSet<String>,
}

/// UI projection of a privilege inside a tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivilegeMeta {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub actions: BTreeSet<String>,
}

/// A node of a privilege forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivilegeNode {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<String>,
    pub meta: PrivilegeMeta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PrivilegeNode>,
}

impl From<ResolvedPrivilege> for PrivilegeNode {
    fn from(resolved: ResolvedPrivilege) -> Self {
        let ResolvedPrivilege { privilege, actions } = resolved;
        PrivilegeNode {
            id: privilege.id,
            name: privilege.name,
            superior_id: privilege.superior_id,
            meta: PrivilegeMeta {
                path: privilege.path,
                redirect: privilege.redirect,
                component: privilege.component,
                icon: privilege.icon,
                actions,
            },
            children: Vec::new(),
        }
    }
}

impl From<Privilege> for PrivilegeNode {
    fn from(privilege: Privilege) -> Self {
        ResolvedPrivilege {
            privilege,
            actions: BTreeSet::new(),
        }
        .into()
    }
}
