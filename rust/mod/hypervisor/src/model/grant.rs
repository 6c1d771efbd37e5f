use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A role's grant on a privilege.
///
/// An empty `actions` set is a visibility-only (menu) grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePrivilege {
    pub id: String,
    pub role_id: String,
    pub privilege_id: String,
    pub actions: BTreeSet<String>,
}

/// A group's direct grant on a privilege, bypassing roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPrivilege {
    pub id: String,
    pub group_id: String,
    pub privilege_id: String,
    pub actions: BTreeSet<String>,
}

/// A user's membership in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: String,
    pub username: String,
}

/// A role attached to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRole {
    pub group_id: String,
    pub role_id: String,
}

/// A user holding a role directly, outside any group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleMember {
    pub role_id: String,
    pub username: String,
}

/// Query input for relation endpoints: `?action=modify`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub action: Option<String>,
}

/// Input for membership endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMember {
    pub username: String,
}

/// Build the authority strings a grant contributes for one privilege name.
///
/// A visibility-only grant yields the bare name; an action grant yields the
/// bare name plus `name:action`.
pub fn authorities_for(name: &str, action: Option<&str>) -> Vec<String> {
    match action {
        Some(action) => vec![name.to_string(), format!("{}:{}", name, action)],
        None => vec![name.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorities_for() {
        assert_eq!(authorities_for("user", None), vec!["user"]);
        assert_eq!(authorities_for("user", Some("modify")), vec!["user", "user:modify"]);
    }
}
