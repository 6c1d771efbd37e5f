use hypervisor_core::{ListParams, ListResult, new_id, now_rfc3339};
use hypervisor_sql::{Executor, Value, with_transaction};
use tracing::info;

use crate::model::{CreateGroup, Group, GroupMember, GroupNode, GroupRole, ModifyGroup, Role};
use crate::service::authority::rebuild_authorities;
use crate::service::forest::build_forest;
use crate::service::{AdminError, AdminService, page, require};
use crate::store::records;
use crate::store::GrantStore;

const TABLE: &str = "groups";
const SORTABLE: &[&str] = &["name", "created_at", "updated_at"];

fn indexes(group: &Group) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::from(group.name.as_str())),
        ("superior_id", Value::from(group.superior_id.as_deref())),
        ("enabled", Value::from(group.enabled)),
        ("updated_at", Value::from(group.updated_at.as_str())),
    ]
}

impl AdminService {
    /// Create a new group. A given superior must exist.
    pub fn create_group(&self, input: CreateGroup) -> Result<Group, AdminError> {
        require(&input.name, "group name")?;
        let superior_id = input.superior_id.filter(|s| !s.is_empty());
        if let Some(ref superior) = superior_id {
            self.fetch_group(superior)?;
        }
        if self.group_exists(&input.name, None)? {
            return Err(AdminError::Conflict(format!("group {} already exists", input.name)));
        }

        let now = now_rfc3339();
        let group = Group {
            id: new_id(),
            name: input.name,
            superior_id,
            description: input.description,
            enabled: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let mut idx = indexes(&group);
        idx.push(("created_at", Value::Text(now)));
        records::insert(self.sql.as_ref(), TABLE, &group.id, &group, &idx)?;
        info!("created group {} ({})", group.name, group.id);
        Ok(group)
    }

    pub fn fetch_group(&self, id: &str) -> Result<Group, AdminError> {
        records::fetch(self.sql.as_ref(), TABLE, id)
    }

    pub fn retrieve_groups(&self, params: &ListParams) -> Result<ListResult<Group>, AdminError> {
        let (items, total) = records::list(self.sql.as_ref(), TABLE, &[], params, SORTABLE)?;
        Ok(page(items, total, params))
    }

    pub fn group_exists(&self, name: &str, exclude_id: Option<&str>) -> Result<bool, AdminError> {
        records::exists(self.sql.as_ref(), TABLE, "name", name, exclude_id, &[])
    }

    pub fn modify_group(&self, id: &str, patch: ModifyGroup) -> Result<Group, AdminError> {
        let mut group = self.fetch_group(id)?;
        let old_name = group.name.clone();

        if let Some(Some(superior)) = &patch.superior_id {
            if !superior.is_empty() && group.superior_id.as_deref() != Some(superior.as_str()) {
                self.check_superior(TABLE, id, superior)?;
            }
        }

        group.apply(patch);
        group.superior_id = group.superior_id.filter(|s| !s.is_empty());
        require(&group.name, "group name")?;
        if group.name != old_name && self.group_exists(&group.name, Some(id))? {
            return Err(AdminError::Conflict(format!("group {} already exists", group.name)));
        }
        group.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &group, &indexes(&group))?;
        Ok(group)
    }

    /// Delete a group with its memberships, roles, grants and authorities.
    ///
    /// Child groups are kept and moved to the top level.
    pub fn remove_group(&self, id: &str) -> Result<(), AdminError> {
        let group = self.fetch_group(id)?;
        with_transaction(self.sql.as_ref(), |tx| {
            let key = [Value::from(id)];
            tx.exec("DELETE FROM group_members WHERE group_id = ?1", &key)?;
            tx.exec("DELETE FROM group_roles WHERE group_id = ?1", &key)?;
            tx.exec("DELETE FROM group_privileges WHERE group_id = ?1", &key)?;
            tx.exec("DELETE FROM group_authorities WHERE group_id = ?1", &key)?;
            let children: Vec<Group> = records::all(tx, TABLE, &[("superior_id", Value::from(id))])?;
            let now = now_rfc3339();
            for mut child in children {
                child.superior_id = None;
                child.updated_at = now.clone();
                records::update(tx, TABLE, &child.id, &child, &indexes(&child))?;
            }
            records::delete(tx, TABLE, id)?;
            Ok::<_, AdminError>(())
        })?;
        info!("removed group {} ({})", group.name, id);
        Ok(())
    }

    /// Flip the enabled flag.
    pub fn enable_group(&self, id: &str) -> Result<Group, AdminError> {
        let mut group = self.fetch_group(id)?;
        group.enabled = !group.enabled;
        group.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &group, &indexes(&group))?;
        Ok(group)
    }

    /// Every group as a forest.
    pub fn group_tree(&self) -> Result<Vec<GroupNode>, AdminError> {
        let all: Vec<Group> = records::all(self.sql.as_ref(), TABLE, &[])?;
        Ok(build_forest(all.into_iter().map(GroupNode::from).collect()))
    }

    // ── Members ──

    pub fn add_group_member(&self, group_id: &str, username: &str) -> Result<GroupMember, AdminError> {
        let username = require(username, "username")?;
        self.fetch_group(group_id)?;
        if !self.user_exists(username, None)? {
            return Err(AdminError::NotFound(format!("users/{}", username)));
        }

        self.sql.exec(
            "INSERT OR IGNORE INTO group_members (group_id, username) VALUES (?1, ?2)",
            &[Value::from(group_id), Value::from(username)],
        )?;
        Ok(GroupMember {
            group_id: group_id.to_string(),
            username: username.to_string(),
        })
    }

    pub fn remove_group_member(&self, group_id: &str, username: &str) -> Result<(), AdminError> {
        let affected = self.sql.exec(
            "DELETE FROM group_members WHERE group_id = ?1 AND username = ?2",
            &[Value::from(group_id), Value::from(username)],
        )?;
        if affected == 0 {
            return Err(AdminError::NotFound(format!(
                "member {} not found in group {}",
                username, group_id
            )));
        }
        Ok(())
    }

    pub fn list_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>, AdminError> {
        self.fetch_group(group_id)?;
        let rows = self.sql.query(
            "SELECT username FROM group_members WHERE group_id = ?1 ORDER BY username",
            &[Value::from(group_id)],
        )?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("username"))
            .map(|username| GroupMember {
                group_id: group_id.to_string(),
                username: username.to_string(),
            })
            .collect())
    }

    // ── Roles ──

    /// Attach a role to the group and extend the group's authorities with
    /// the role's grants.
    pub fn add_group_role(&self, group_id: &str, role_id: &str) -> Result<GroupRole, AdminError> {
        self.fetch_group(group_id)?;
        self.fetch_role(role_id)?;

        with_transaction(self.sql.as_ref(), |tx| {
            tx.exec(
                "INSERT OR IGNORE INTO group_roles (group_id, role_id) VALUES (?1, ?2)",
                &[Value::from(group_id), Value::from(role_id)],
            )?;
            rebuild_authorities(tx, group_id)
        })?;
        info!("attached role {} to group {}", role_id, group_id);
        Ok(GroupRole {
            group_id: group_id.to_string(),
            role_id: role_id.to_string(),
        })
    }

    pub fn remove_group_role(&self, group_id: &str, role_id: &str) -> Result<(), AdminError> {
        with_transaction(self.sql.as_ref(), |tx| {
            let affected = tx.exec(
                "DELETE FROM group_roles WHERE group_id = ?1 AND role_id = ?2",
                &[Value::from(group_id), Value::from(role_id)],
            )?;
            if affected == 0 {
                return Err(AdminError::NotFound(format!(
                    "role {} not attached to group {}",
                    role_id, group_id
                )));
            }
            rebuild_authorities(tx, group_id)?;
            Ok(())
        })?;
        info!("detached role {} from group {}", role_id, group_id);
        Ok(())
    }

    /// Roles attached to the group, in id order.
    pub fn list_group_roles(&self, group_id: &str) -> Result<Vec<Role>, AdminError> {
        self.fetch_group(group_id)?;
        let mut roles: Vec<Role> = Vec::new();
        for role_id in self.sql.role_ids_of_group(group_id)? {
            if let Some(role) = records::get(self.sql.as_ref(), "roles", &role_id)? {
                roles.push(role);
            }
        }
        Ok(roles)
    }
}
