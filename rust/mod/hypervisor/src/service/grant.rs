//! Role↔privilege and group↔privilege grant maintenance.
//!
//! Every grant change also updates the `group_authorities` index of the
//! groups it affects: the group itself for a direct grant, every group
//! holding the role for a role grant. Both writes share one transaction.

use std::collections::BTreeSet;

use hypervisor_core::new_id;
use hypervisor_sql::with_transaction;
use tracing::info;

use crate::model::{GroupPrivilege, RolePrivilege, authorities_for};
use crate::service::{AdminError, AdminService, normalize_action, require};
use crate::store::{AuthorityIndex, Grant, GrantStore, Holder, PrivilegeStore};

impl AdminService {
    /// Grant `privilege_id` to a role with a single action, or visibility
    /// only when `action` is blank. Replaces the action set of an existing
    /// grant rather than adding to it.
    pub fn relate_role_privilege(
        &self,
        role_id: &str,
        privilege_id: &str,
        action: Option<&str>,
    ) -> Result<RolePrivilege, AdminError> {
        require(role_id, "role id")?;
        self.relate(Holder::Role(role_id), privilege_id, action)
            .map(RolePrivilege::from)
    }

    /// Withdraw one action from a role grant, or the whole grant when `action` is blank.
    pub fn remove_role_privilege(
        &self,
        role_id: &str,
        privilege_id: &str,
        action: Option<&str>,
    ) -> Result<(), AdminError> {
        require(role_id, "role id")?;
        self.unrelate(Holder::Role(role_id), privilege_id, action)
    }

    /// Group counterpart of [`AdminService::relate_role_privilege`].
    pub fn relate_group_privilege(
        &self,
        group_id: &str,
        privilege_id: &str,
        action: Option<&str>,
    ) -> Result<GroupPrivilege, AdminError> {
        require(group_id, "group id")?;
        self.relate(Holder::Group(group_id), privilege_id, action)
            .map(GroupPrivilege::from)
    }

    /// Group counterpart of [`AdminService::remove_role_privilege`].
    pub fn remove_group_privilege(
        &self,
        group_id: &str,
        privilege_id: &str,
        action: Option<&str>,
    ) -> Result<(), AdminError> {
        require(group_id, "group id")?;
        self.unrelate(Holder::Group(group_id), privilege_id, action)
    }

    pub fn role_privileges(&self, role_id: &str) -> Result<Vec<RolePrivilege>, AdminError> {
        let grants = self.sql.grants_of(Holder::Role(require(role_id, "role id")?))?;
        Ok(grants.into_iter().map(RolePrivilege::from).collect())
    }

    pub fn group_privileges(&self, group_id: &str) -> Result<Vec<GroupPrivilege>, AdminError> {
        let grants = self.sql.grants_of(Holder::Group(require(group_id, "group id")?))?;
        Ok(grants.into_iter().map(GroupPrivilege::from).collect())
    }

    fn relate(
        &self,
        holder: Holder<'_>,
        privilege_id: &str,
        action: Option<&str>,
    ) -> Result<Grant, AdminError> {
        let privilege_id = require(privilege_id, "privilege id")?;
        let action = normalize_action(action);

        let grant = with_transaction(self.sql.as_ref(), |tx| {
            relate_grant(tx, holder, privilege_id, action)
        })?;
        info!(
            "granted privilege {} to {:?} with actions {:?}",
            privilege_id, holder, grant.actions
        );
        Ok(grant)
    }

    fn unrelate(
        &self,
        holder: Holder<'_>,
        privilege_id: &str,
        action: Option<&str>,
    ) -> Result<(), AdminError> {
        let privilege_id = require(privilege_id, "privilege id")?;
        let action = normalize_action(action);

        with_transaction(self.sql.as_ref(), |tx| {
            remove_grant(tx, holder, privilege_id, action)
        })?;
        info!(
            "withdrew privilege {} from {:?} (action {:?})",
            privilege_id, holder, action
        );
        Ok(())
    }
}

/// Groups whose authority index follows the holder's grants.
fn affected_groups<S>(store: &S, holder: Holder<'_>) -> Result<Vec<String>, AdminError>
where
    S: GrantStore + ?Sized,
{
    match holder {
        Holder::Role(role_id) => store.group_ids_with_role(role_id),
        Holder::Group(group_id) => Ok(vec![group_id.to_string()]),
    }
}

/// Upsert the grant and add the authorities it implies.
pub(crate) fn relate_grant<S>(
    store: &S,
    holder: Holder<'_>,
    privilege_id: &str,
    action: Option<&str>,
) -> Result<Grant, AdminError>
where
    S: GrantStore + PrivilegeStore + AuthorityIndex + ?Sized,
{
    let actions: BTreeSet<String> = action.map(str::to_string).into_iter().collect();
    let id = match store.grant(holder, privilege_id)? {
        Some(existing) => existing.id,
        None => new_id(),
    };
    let grant = Grant {
        id,
        holder_id: holder.id().to_string(),
        privilege_id: privilege_id.to_string(),
        actions,
    };
    store.save_grant(holder, &grant)?;

    if let Some(privilege) = store.privilege_by_id(privilege_id)? {
        let authorities = authorities_for(&privilege.name, action);
        for group_id in affected_groups(store, holder)? {
            for authority in &authorities {
                store.add_authority(&group_id, authority)?;
            }
        }
    }

    Ok(grant)
}

/// Withdraw an action (or the whole grant) and drop the matching authorities.
pub(crate) fn remove_grant<S>(
    store: &S,
    holder: Holder<'_>,
    privilege_id: &str,
    action: Option<&str>,
) -> Result<(), AdminError>
where
    S: GrantStore + PrivilegeStore + AuthorityIndex + ?Sized,
{
    let Some(mut existing) = store.grant(holder, privilege_id)? else {
        return Ok(());
    };

    match action {
        None => store.delete_grant(holder, &existing.id)?,
        Some(action) => {
            if existing.actions.remove(action) {
                store.save_grant(holder, &existing)?;
            }
        }
    }

    if let Some(privilege) = store.privilege_by_id(privilege_id)? {
        for group_id in affected_groups(store, holder)? {
            match action {
                Some(action) => {
                    store.remove_authority(&group_id, &format!("{}:{}", privilege.name, action))?;
                }
                None => {
                    store.remove_authorities_of(&group_id, &privilege.name)?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::model::{CreateGroup, CreatePrivilege, CreateRole};
    use crate::service::AdminError;
    use crate::service::test_support::test_service;

    fn setup() -> (std::sync::Arc<crate::service::AdminService>, String, String, Vec<String>) {
        let svc = test_service();
        let privilege = svc
            .create_privilege(CreatePrivilege {
                name: "user".into(),
                path: "/user".into(),
                ..Default::default()
            })
            .unwrap();
        let role = svc.create_role(CreateRole { name: "editor".into(), ..Default::default() }).unwrap();
        let mut groups = Vec::new();
        for name in ["east", "west"] {
            let g = svc.create_group(CreateGroup { name: name.into(), ..Default::default() }).unwrap();
            svc.add_group_role(&g.id, &role.id).unwrap();
            groups.push(g.id);
        }
        (svc, role.id, privilege.id, groups)
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_blank_ids_rejected() {
        let svc = test_service();
        assert!(matches!(
            svc.relate_role_privilege("", "p", None),
            Err(AdminError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.relate_group_privilege("g", " ", Some("edit")),
            Err(AdminError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.remove_role_privilege("r", "", None),
            Err(AdminError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_relation_replaces_actions_and_reuses_row() {
        let (svc, role, privilege, _) = setup();

        let first = svc.relate_role_privilege(&role, &privilege, Some("")).unwrap();
        assert!(first.actions.is_empty());

        let second = svc.relate_role_privilege(&role, &privilege, Some("edit")).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.actions, set(&["edit"]));

        let rows = svc.role_privileges(&role).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actions, set(&["edit"]));
    }

    #[test]
    fn test_relation_adds_authorities_to_every_group() {
        let (svc, role, privilege, groups) = setup();
        svc.relate_role_privilege(&role, &privilege, Some("edit")).unwrap();

        for group in &groups {
            assert_eq!(svc.group_authorities(group).unwrap(), vec!["user", "user:edit"]);
        }

        // Re-relating is idempotent on the index.
        svc.relate_role_privilege(&role, &privilege, Some("edit")).unwrap();
        assert_eq!(svc.group_authorities(&groups[0]).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_single_action_keeps_grant_and_bare_authority() {
        let (svc, role, privilege, groups) = setup();
        svc.relate_role_privilege(&role, &privilege, Some("edit")).unwrap();

        svc.remove_role_privilege(&role, &privilege, Some("edit")).unwrap();

        let rows = svc.role_privileges(&role).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].actions.is_empty());
        for group in &groups {
            assert_eq!(svc.group_authorities(group).unwrap(), vec!["user"]);
        }
    }

    #[test]
    fn test_remove_blank_action_drops_grant_and_all_authorities() {
        let (svc, role, privilege, groups) = setup();
        let other = svc
            .create_privilege(CreatePrivilege { name: "username".into(), ..Default::default() })
            .unwrap();
        svc.relate_role_privilege(&role, &privilege, Some("edit")).unwrap();
        svc.relate_role_privilege(&role, &other.id, Some("view")).unwrap();

        svc.remove_role_privilege(&role, &privilege, None).unwrap();

        let rows = svc.role_privileges(&role).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].privilege_id, other.id);
        for group in &groups {
            // A privilege whose name merely starts with "user" is untouched.
            assert_eq!(
                svc.group_authorities(group).unwrap(),
                vec!["username", "username:view"]
            );
        }
    }

    #[test]
    fn test_remove_without_grant_is_noop() {
        let (svc, role, privilege, _) = setup();
        svc.remove_role_privilege(&role, &privilege, None).unwrap();
        svc.remove_role_privilege(&role, &privilege, Some("edit")).unwrap();
        assert!(svc.role_privileges(&role).unwrap().is_empty());
    }

    #[test]
    fn test_missing_privilege_still_writes_grant() {
        let (svc, role, _, groups) = setup();
        let grant = svc.relate_role_privilege(&role, "no-such-privilege", Some("edit")).unwrap();
        assert_eq!(grant.privilege_id, "no-such-privilege");
        assert_eq!(svc.role_privileges(&role).unwrap().len(), 1);
        assert!(svc.group_authorities(&groups[0]).unwrap().is_empty());

        svc.remove_role_privilege(&role, "no-such-privilege", None).unwrap();
        assert!(svc.role_privileges(&role).unwrap().is_empty());
    }

    #[test]
    fn test_group_grant_targets_only_that_group() {
        let (svc, _, privilege, groups) = setup();
        let grant = svc.relate_group_privilege(&groups[0], &privilege, Some("export")).unwrap();
        assert_eq!(grant.group_id, groups[0]);

        assert_eq!(svc.group_authorities(&groups[0]).unwrap(), vec!["user", "user:export"]);
        assert!(svc.group_authorities(&groups[1]).unwrap().is_empty());

        svc.remove_group_privilege(&groups[0], &privilege, None).unwrap();
        assert!(svc.group_privileges(&groups[0]).unwrap().is_empty());
        assert!(svc.group_authorities(&groups[0]).unwrap().is_empty());
    }

    #[test]
    fn test_remove_group_single_action() {
        let (svc, _, privilege, groups) = setup();
        svc.relate_group_privilege(&groups[0], &privilege, Some("export")).unwrap();

        svc.remove_group_privilege(&groups[0], &privilege, Some("export")).unwrap();

        let rows = svc.group_privileges(&groups[0]).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].actions.is_empty());
        assert_eq!(svc.group_authorities(&groups[0]).unwrap(), vec!["user"]);

        // Withdrawing an action the row never had leaves it alone.
        svc.remove_group_privilege(&groups[0], &privilege, Some("import")).unwrap();
        assert_eq!(svc.group_privileges(&groups[0]).unwrap().len(), 1);
        assert_eq!(svc.group_authorities(&groups[0]).unwrap(), vec!["user"]);
    }

    #[test]
    fn test_relate_other_action_keeps_earlier_authority() {
        let (svc, role, privilege, groups) = setup();
        svc.relate_role_privilege(&role, &privilege, Some("edit")).unwrap();
        let grant = svc.relate_role_privilege(&role, &privilege, Some("view")).unwrap();

        // The row is replaced, the index only ever grows on relate.
        assert_eq!(grant.actions, set(&["view"]));
        assert_eq!(svc.role_privileges(&role).unwrap()[0].actions, set(&["view"]));
        for group in &groups {
            assert_eq!(
                svc.group_authorities(group).unwrap(),
                vec!["user", "user:edit", "user:view"]
            );
        }

        // A rebuild brings the index back in line with the rows.
        assert_eq!(
            svc.rebuild_group_authorities(&groups[0]).unwrap(),
            vec!["user", "user:view"]
        );
    }

    #[test]
    fn test_remove_whole_grant_ignores_names_differing_in_case() {
        let (svc, _, lower, groups) = setup();
        let upper = svc
            .create_privilege(CreatePrivilege { name: "USER".into(), ..Default::default() })
            .unwrap();
        svc.relate_group_privilege(&groups[0], &lower, Some("edit")).unwrap();
        svc.relate_group_privilege(&groups[0], &upper.id, Some("view")).unwrap();

        svc.remove_group_privilege(&groups[0], &upper.id, None).unwrap();

        assert_eq!(svc.group_authorities(&groups[0]).unwrap(), vec!["user", "user:edit"]);
        let rows = svc.group_privileges(&groups[0]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].privilege_id, lower);
    }
}
