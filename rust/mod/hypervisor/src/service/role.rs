use hypervisor_core::{ListParams, ListResult, new_id, now_rfc3339};
use hypervisor_sql::{Executor, Value, with_transaction};
use tracing::info;

use crate::model::{CreateRole, ModifyRole, Role, RoleMember};
use crate::service::authority::rebuild_authorities;
use crate::service::{AdminError, AdminService, page, require};
use crate::store::records;
use crate::store::GrantStore;

const TABLE: &str = "roles";
const SORTABLE: &[&str] = &["name", "created_at", "updated_at"];

fn indexes(role: &Role) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::from(role.name.as_str())),
        ("enabled", Value::from(role.enabled)),
        ("updated_at", Value::from(role.updated_at.as_str())),
    ]
}

impl AdminService {
    pub fn create_role(&self, input: CreateRole) -> Result<Role, AdminError> {
        require(&input.name, "role name")?;
        if self.role_exists(&input.name, None)? {
            return Err(AdminError::Conflict(format!("role {} already exists", input.name)));
        }

        let now = now_rfc3339();
        let role = Role {
            id: new_id(),
            name: input.name,
            description: input.description,
            enabled: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let mut idx = indexes(&role);
        idx.push(("created_at", Value::Text(now)));
        records::insert(self.sql.as_ref(), TABLE, &role.id, &role, &idx)?;
        info!("created role {} ({})", role.name, role.id);
        Ok(role)
    }

    pub fn fetch_role(&self, id: &str) -> Result<Role, AdminError> {
        records::fetch(self.sql.as_ref(), TABLE, id)
    }

    pub fn retrieve_roles(&self, params: &ListParams) -> Result<ListResult<Role>, AdminError> {
        let (items, total) = records::list(self.sql.as_ref(), TABLE, &[], params, SORTABLE)?;
        Ok(page(items, total, params))
    }

    pub fn role_exists(&self, name: &str, exclude_id: Option<&str>) -> Result<bool, AdminError> {
        records::exists(self.sql.as_ref(), TABLE, "name", name, exclude_id, &[])
    }

    pub fn modify_role(&self, id: &str, patch: ModifyRole) -> Result<Role, AdminError> {
        let mut role = self.fetch_role(id)?;
        let old_name = role.name.clone();
        role.apply(patch);
        require(&role.name, "role name")?;
        if role.name != old_name && self.role_exists(&role.name, Some(id))? {
            return Err(AdminError::Conflict(format!("role {} already exists", role.name)));
        }
        role.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &role, &indexes(&role))?;
        Ok(role)
    }

    /// Delete a role, its grants and memberships.
    ///
    /// Groups that carried the role lose the authorities it contributed.
    pub fn remove_role(&self, id: &str) -> Result<(), AdminError> {
        let role = self.fetch_role(id)?;
        with_transaction(self.sql.as_ref(), |tx| {
            let groups = tx.group_ids_with_role(id)?;
            let key = [Value::from(id)];
            tx.exec("DELETE FROM role_privileges WHERE role_id = ?1", &key)?;
            tx.exec("DELETE FROM group_roles WHERE role_id = ?1", &key)?;
            tx.exec("DELETE FROM role_members WHERE role_id = ?1", &key)?;
            records::delete(tx, TABLE, id)?;
            for group_id in groups {
                rebuild_authorities(tx, &group_id)?;
            }
            Ok::<_, AdminError>(())
        })?;
        info!("removed role {} ({})", role.name, id);
        Ok(())
    }

    /// Flip the enabled flag.
    pub fn enable_role(&self, id: &str) -> Result<Role, AdminError> {
        let mut role = self.fetch_role(id)?;
        role.enabled = !role.enabled;
        role.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &role, &indexes(&role))?;
        Ok(role)
    }

    /// Give `username` the role directly, outside any group.
    pub fn add_role_member(&self, role_id: &str, username: &str) -> Result<RoleMember, AdminError> {
        let username = require(username, "username")?;
        self.fetch_role(role_id)?;
        if !self.user_exists(username, None)? {
            return Err(AdminError::NotFound(format!("users/{}", username)));
        }

        self.sql.exec(
            "INSERT OR IGNORE INTO role_members (role_id, username) VALUES (?1, ?2)",
            &[Value::from(role_id), Value::from(username)],
        )?;
        Ok(RoleMember {
            role_id: role_id.to_string(),
            username: username.to_string(),
        })
    }

    pub fn remove_role_member(&self, role_id: &str, username: &str) -> Result<(), AdminError> {
        let affected = self.sql.exec(
            "DELETE FROM role_members WHERE role_id = ?1 AND username = ?2",
            &[Value::from(role_id), Value::from(username)],
        )?;
        if affected == 0 {
            return Err(AdminError::NotFound(format!(
                "member {} not found in role {}",
                username, role_id
            )));
        }
        Ok(())
    }

    pub fn list_role_members(&self, role_id: &str) -> Result<Vec<RoleMember>, AdminError> {
        self.fetch_role(role_id)?;
        let rows = self.sql.query(
            "SELECT username FROM role_members WHERE role_id = ?1 ORDER BY username",
            &[Value::from(role_id)],
        )?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("username"))
            .map(|username| RoleMember {
                role_id: role_id.to_string(),
                username: username.to_string(),
            })
            .collect())
    }
}
