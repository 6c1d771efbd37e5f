use std::collections::BTreeSet;

use hypervisor_sql::{Executor, Value, with_transaction};
use tracing::info;

use crate::model::authorities_for;
use crate::service::{AdminError, AdminService, require};
use crate::store::{AuthorityIndex, GrantStore, Holder, PrivilegeStore};

impl AdminService {
    /// Every authority string `username` holds through its groups.
    pub fn authorities(&self, username: &str) -> Result<BTreeSet<String>, AdminError> {
        let username = require(username, "username")?;
        let mut out = BTreeSet::new();
        for group_id in self.sql.group_ids_of_user(username)? {
            out.extend(self.sql.authorities_of_group(&group_id)?);
        }
        Ok(out)
    }

    /// Whether `username` holds `authority`, e.g. `user` or `user:modify`.
    pub fn has_authority(&self, username: &str, authority: &str) -> Result<bool, AdminError> {
        let authority = require(authority, "authority")?;
        Ok(self.authorities(username)?.contains(authority))
    }

    pub fn group_authorities(&self, group_id: &str) -> Result<Vec<String>, AdminError> {
        Ok(self.sql.authorities_of_group(require(group_id, "group id")?)?)
    }

    /// Recompute a group's authority index from its current grants.
    ///
    /// Covers the group's direct grants and those of every attached role.
    /// Returns the rebuilt authority list.
    pub fn rebuild_group_authorities(&self, group_id: &str) -> Result<Vec<String>, AdminError> {
        let group_id = require(group_id, "group id")?;
        let authorities = with_transaction(self.sql.as_ref(), |tx| rebuild_authorities(tx, group_id))?;
        info!("rebuilt {} authorities for group {}", authorities.len(), group_id);
        Ok(authorities)
    }
}

/// Replace `group_id`'s authority rows with the set implied by its grants.
pub(crate) fn rebuild_authorities(tx: &dyn Executor, group_id: &str) -> Result<Vec<String>, AdminError> {
    let mut grants = tx.grants_of(Holder::Group(group_id))?;
    for role_id in tx.role_ids_of_group(group_id)? {
        grants.extend(tx.grants_of(Holder::Role(&role_id))?);
    }

    let mut wanted = BTreeSet::new();
    for grant in grants {
        let Some(privilege) = tx.privilege_by_id(&grant.privilege_id)? else {
            continue;
        };
        wanted.extend(authorities_for(&privilege.name, None));
        for action in &grant.actions {
            wanted.extend(authorities_for(&privilege.name, Some(action)));
        }
    }

    tx.clear_authorities(group_id)?;
    for authority in &wanted {
        tx.add_authority(group_id, authority)?;
    }
    Ok(wanted.into_iter().collect())
}

/// Groups whose authority index depends on `privilege_id`, directly or via a role.
pub(crate) fn groups_reaching(tx: &dyn Executor, privilege_id: &str) -> Result<BTreeSet<String>, AdminError> {
    let mut groups = BTreeSet::new();
    let direct = tx.query(
        "SELECT group_id FROM group_privileges WHERE privilege_id = ?1",
        &[Value::from(privilege_id)],
    )?;
    groups.extend(direct.iter().filter_map(|r| r.get_str("group_id").map(str::to_string)));

    let via_roles = tx.query(
        "SELECT DISTINCT gr.group_id FROM group_roles gr \
         JOIN role_privileges rp ON rp.role_id = gr.role_id \
         WHERE rp.privilege_id = ?1",
        &[Value::from(privilege_id)],
    )?;
    groups.extend(via_roles.iter().filter_map(|r| r.get_str("group_id").map(str::to_string)));
    Ok(groups)
}
