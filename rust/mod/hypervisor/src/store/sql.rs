use std::collections::BTreeSet;

use hypervisor_sql::{Executor, Row, Value};

use super::records::{all, decode, get};
use super::{AuthorityIndex, Grant, GrantStore, Holder, PrivilegeStore};
use crate::model::Privilege;
use crate::service::AdminError;

/// Bound parameters per `IN (...)` lookup.
const ID_CHUNK: usize = 500;

fn string_column(rows: &[Row], column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.get_str(column).map(str::to_string))
        .collect()
}

fn grant_from_row(row: &Row, holder_column: &str) -> Result<Grant, AdminError> {
    let text = |col: &str| {
        row.get_str(col)
            .map(str::to_string)
            .ok_or_else(|| AdminError::Internal(format!("missing {} column", col)))
    };
    let actions: BTreeSet<String> = serde_json::from_str(&text("actions")?)
        .map_err(|e| AdminError::Internal(e.to_string()))?;
    Ok(Grant {
        id: text("id")?,
        holder_id: text(holder_column)?,
        privilege_id: text("privilege_id")?,
        actions,
    })
}

impl<E: Executor + ?Sized> PrivilegeStore for E {
    fn privileges_by_ids(&self, ids: &[String]) -> Result<Vec<Privilege>, AdminError> {
        let mut found = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT data FROM privileges WHERE id IN ({}) ORDER BY created_at, id",
                placeholders.join(", ")
            );
            let params: Vec<Value> = chunk.iter().map(|id| Value::from(id.as_str())).collect();
            for row in &self.query(&sql, &params)? {
                found.push(decode(row)?);
            }
        }
        Ok(found)
    }

    fn privileges_by_superior(
        &self,
        superior_id: Option<&str>,
    ) -> Result<Vec<Privilege>, AdminError> {
        all(self, "privileges", &[("superior_id", Value::from(superior_id))])
    }

    fn privilege_by_id(&self, id: &str) -> Result<Option<Privilege>, AdminError> {
        get(self, "privileges", id)
    }
}

impl<E: Executor + ?Sized> GrantStore for E {
    fn group_ids_of_user(&self, username: &str) -> Result<Vec<String>, AdminError> {
        let rows = self.query(
            "SELECT group_id FROM group_members WHERE username = ?1 ORDER BY group_id",
            &[Value::from(username)],
        )?;
        Ok(string_column(&rows, "group_id"))
    }

    fn role_ids_of_user(&self, username: &str) -> Result<Vec<String>, AdminError> {
        let rows = self.query(
            "SELECT role_id FROM role_members WHERE username = ?1 ORDER BY role_id",
            &[Value::from(username)],
        )?;
        Ok(string_column(&rows, "role_id"))
    }

    fn role_ids_of_group(&self, group_id: &str) -> Result<Vec<String>, AdminError> {
        let rows = self.query(
            "SELECT role_id FROM group_roles WHERE group_id = ?1 ORDER BY role_id",
            &[Value::from(group_id)],
        )?;
        Ok(string_column(&rows, "role_id"))
    }

    fn group_ids_with_role(&self, role_id: &str) -> Result<Vec<String>, AdminError> {
        let rows = self.query(
            "SELECT group_id FROM group_roles WHERE role_id = ?1 ORDER BY group_id",
            &[Value::from(role_id)],
        )?;
        Ok(string_column(&rows, "group_id"))
    }

    fn grants_of(&self, holder: Holder<'_>) -> Result<Vec<Grant>, AdminError> {
        let sql = format!(
            "SELECT id, {col}, privilege_id, actions FROM {table} WHERE {col} = ?1 ORDER BY privilege_id",
            col = holder.holder_column(),
            table = holder.grant_table(),
        );
        self.query(&sql, &[Value::from(holder.id())])?
            .iter()
            .map(|row| grant_from_row(row, holder.holder_column()))
            .collect()
    }

    fn grant(&self, holder: Holder<'_>, privilege_id: &str) -> Result<Option<Grant>, AdminError> {
        let sql = format!(
            "SELECT id, {col}, privilege_id, actions FROM {table} WHERE {col} = ?1 AND privilege_id = ?2",
            col = holder.holder_column(),
            table = holder.grant_table(),
        );
        self.query(&sql, &[Value::from(holder.id()), Value::from(privilege_id)])?
            .first()
            .map(|row| grant_from_row(row, holder.holder_column()))
            .transpose()
    }

    fn save_grant(&self, holder: Holder<'_>, grant: &Grant) -> Result<(), AdminError> {
        let actions =
            serde_json::to_string(&grant.actions).map_err(|e| AdminError::Internal(e.to_string()))?;
        let sql = format!(
            "INSERT INTO {table} (id, {col}, privilege_id, actions) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET actions = excluded.actions",
            col = holder.holder_column(),
            table = holder.grant_table(),
        );
        self.exec(
            &sql,
            &[
                Value::from(grant.id.as_str()),
                Value::from(grant.holder_id.as_str()),
                Value::from(grant.privilege_id.as_str()),
                Value::Text(actions),
            ],
        )?;
        Ok(())
    }

    fn delete_grant(&self, holder: Holder<'_>, id: &str) -> Result<(), AdminError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", holder.grant_table());
        self.exec(&sql, &[Value::from(id)])?;
        Ok(())
    }
}

impl<E: Executor + ?Sized> AuthorityIndex for E {
    fn authorities_of_group(&self, group_id: &str) -> Result<Vec<String>, AdminError> {
        let rows = self.query(
            "SELECT authority FROM group_authorities WHERE group_id = ?1 ORDER BY authority",
            &[Value::from(group_id)],
        )?;
        Ok(string_column(&rows, "authority"))
    }

    fn add_authority(&self, group_id: &str, authority: &str) -> Result<bool, AdminError> {
        let affected = self.exec(
            "INSERT OR IGNORE INTO group_authorities (group_id, authority) VALUES (?1, ?2)",
            &[Value::from(group_id), Value::from(authority)],
        )?;
        Ok(affected > 0)
    }

    fn remove_authority(&self, group_id: &str, authority: &str) -> Result<u64, AdminError> {
        Ok(self.exec(
            "DELETE FROM group_authorities WHERE group_id = ?1 AND authority = ?2",
            &[Value::from(group_id), Value::from(authority)],
        )?)
    }

    fn remove_authorities_of(&self, group_id: &str, name: &str) -> Result<u64, AdminError> {
        // LIKE folds ASCII case, and `user` / `USER` are distinct privileges.
        Ok(self.exec(
            "DELETE FROM group_authorities WHERE group_id = ?1 \
             AND (authority = ?2 OR substr(authority, 1, length(?2) + 1) = ?2 || ':')",
            &[Value::from(group_id), Value::from(name)],
        )?)
    }

    fn clear_authorities(&self, group_id: &str) -> Result<u64, AdminError> {
        Ok(self.exec(
            "DELETE FROM group_authorities WHERE group_id = ?1",
            &[Value::from(group_id)],
        )?)
    }
}
