//! Effective privilege resolution for one user.
//!
//! Grants reach a user along three paths: a group's direct grants, the grants
//! of every role attached to one of the user's groups, and the grants of
//! roles the user holds directly. Actions from all paths are unioned per
//! privilege. Enabled granted privileges are then completed upward with their
//! enabled ancestors so the result renders as a connected menu tree.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::model::{PrivilegeNode, ResolvedPrivilege};
use crate::service::forest::build_forest;
use crate::service::{AdminError, AdminService, require};
use crate::store::{Grant, GrantStore, Holder, PrivilegeStore};

impl AdminService {
    /// The privilege forest `username` can see, annotated with merged actions.
    ///
    /// Unknown users and users without grants get an empty forest.
    pub fn privilege_tree_of(&self, username: &str) -> Result<Vec<PrivilegeNode>, AdminError> {
        resolve_tree(self.sql.as_ref(), username, self.config.max_closure_passes)
    }

    /// Flat form of [`AdminService::privilege_tree_of`].
    pub fn resolve_privileges(&self, username: &str) -> Result<Vec<ResolvedPrivilege>, AdminError> {
        resolve_privileges(self.sql.as_ref(), username, self.config.max_closure_passes)
    }
}

/// Resolve and assemble the privilege forest of `username`.
pub fn resolve_tree<S>(
    store: &S,
    username: &str,
    max_passes: usize,
) -> Result<Vec<PrivilegeNode>, AdminError>
where
    S: PrivilegeStore + GrantStore + ?Sized,
{
    let resolved = resolve_privileges(store, username, max_passes)?;
    Ok(build_forest(resolved.into_iter().map(PrivilegeNode::from).collect()))
}

/// Resolve the enabled privileges visible to `username`, ancestors included.
///
/// Directly granted privileges carry their merged actions. Ancestors pulled in
/// only to complete the tree carry an empty action set. A disabled ancestor is
/// left out and the walk stops on that branch.
pub fn resolve_privileges<S>(
    store: &S,
    username: &str,
    max_passes: usize,
) -> Result<Vec<ResolvedPrivilege>, AdminError>
where
    S: PrivilegeStore + GrantStore + ?Sized,
{
    let username = require(username, "username")?;

    let granted = collect_actions(store, username)?;
    if granted.is_empty() {
        debug!("user {} has no privilege grants", username);
        return Ok(Vec::new());
    }

    let granted_ids: Vec<String> = granted.keys().cloned().collect();
    let mut resolved: BTreeMap<String, ResolvedPrivilege> = BTreeMap::new();
    for privilege in store.privileges_by_ids(&granted_ids)? {
        if !privilege.enabled {
            continue;
        }
        let actions = granted.get(&privilege.id).cloned().unwrap_or_default();
        resolved
            .entry(privilege.id.clone())
            .or_insert(ResolvedPrivilege { privilege, actions });
    }

    // Ids already requested from the store, whether or not they came back.
    let mut visited: HashSet<String> = granted_ids.into_iter().collect();
    let mut pending = missing_superiors(&resolved, &visited);
    let mut passes = 0;

    while !pending.is_empty() {
        if passes >= max_passes {
            warn!(
                "privilege ancestry for {} exceeds {} levels, {} superiors left unresolved",
                username,
                max_passes,
                pending.len()
            );
            break;
        }
        passes += 1;

        visited.extend(pending.iter().cloned());
        for ancestor in store.privileges_by_ids(&pending)? {
            if !ancestor.enabled {
                continue;
            }
            resolved
                .entry(ancestor.id.clone())
                .or_insert_with(|| ResolvedPrivilege {
                    privilege: ancestor,
                    actions: BTreeSet::new(),
                });
        }
        pending = missing_superiors(&resolved, &visited);
    }

    debug!(
        "resolved {} privileges for {} ({} granted, {} ancestor passes)",
        resolved.len(),
        username,
        granted.len(),
        passes
    );
    Ok(resolved.into_values().collect())
}

/// Union the action sets of every grant reaching `username`.
fn collect_actions<S>(store: &S, username: &str) -> Result<BTreeMap<String, BTreeSet<String>>, AdminError>
where
    S: GrantStore + ?Sized,
{
    let mut actions = BTreeMap::new();

    for group_id in store.group_ids_of_user(username)? {
        merge(&mut actions, store.grants_of(Holder::Group(&group_id))?);
        for role_id in store.role_ids_of_group(&group_id)? {
            merge(&mut actions, store.grants_of(Holder::Role(&role_id))?);
        }
    }
    for role_id in store.role_ids_of_user(username)? {
        merge(&mut actions, store.grants_of(Holder::Role(&role_id))?);
    }

    Ok(actions)
}

fn merge(into: &mut BTreeMap<String, BTreeSet<String>>, grants: Vec<Grant>) {
    for grant in grants {
        into.entry(grant.privilege_id).or_default().extend(grant.actions);
    }
}

/// Superior ids referenced by resolved privileges that are neither resolved
/// nor already requested.
fn missing_superiors(
    resolved: &BTreeMap<String, ResolvedPrivilege>,
    visited: &HashSet<String>,
) -> Vec<String> {
    let missing: BTreeSet<&String> = resolved
        .values()
        .filter_map(|r| r.privilege.superior_id.as_ref())
        .filter(|id| !resolved.contains_key(*id) && !visited.contains(*id))
        .collect();
    missing.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::model::{CreateGroup, CreatePrivilege, CreateRole, CreateUser, PrivilegeNode};
    use crate::service::AdminError;
    use crate::service::test_support::{hold, join, test_service};

    fn privilege(name: &str, superior_id: Option<&str>) -> CreatePrivilege {
        CreatePrivilege {
            name: name.to_string(),
            superior_id: superior_id.map(str::to_string),
            path: format!("/{}", name),
            ..Default::default()
        }
    }

    fn actions(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn find<'a>(forest: &'a [PrivilegeNode], name: &str) -> Option<&'a PrivilegeNode> {
        for node in forest {
            if node.name == name {
                return Some(node);
            }
            if let Some(found) = find(&node.children, name) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn test_blank_username_rejected() {
        let svc = test_service();
        assert!(matches!(svc.privilege_tree_of(""), Err(AdminError::InvalidArgument(_))));
        assert!(matches!(svc.privilege_tree_of("   "), Err(AdminError::InvalidArgument(_))));
    }

    #[test]
    fn test_user_without_memberships_gets_empty_forest() {
        let svc = test_service();
        svc.create_user(CreateUser {
            username: "nobody".into(),
            ..Default::default()
        })
        .unwrap();
        svc.create_privilege(privilege("system", None)).unwrap();

        assert!(svc.privilege_tree_of("nobody").unwrap().is_empty());
        assert!(svc.privilege_tree_of("never-created").unwrap().is_empty());
    }

    #[test]
    fn test_group_and_role_grants_union() {
        let svc = test_service();
        let p0 = svc.create_privilege(privilege("system", None)).unwrap();
        let p1 = svc.create_privilege(privilege("user", Some(&p0.id))).unwrap();
        let g1 = svc.create_group(CreateGroup { name: "G1".into(), ..Default::default() }).unwrap();
        let r1 = svc.create_role(CreateRole { name: "R1".into(), ..Default::default() }).unwrap();

        join(&svc, &g1.id, "alice");
        svc.add_group_role(&g1.id, &r1.id).unwrap();
        svc.relate_role_privilege(&r1.id, &p1.id, Some("view")).unwrap();
        svc.relate_group_privilege(&g1.id, &p1.id, Some("edit")).unwrap();

        let forest = svc.privilege_tree_of("alice").unwrap();
        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        assert_eq!(root.id, p0.id);
        assert!(root.meta.actions.is_empty());
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].id, p1.id);
        assert_eq!(root.children[0].meta.actions, actions(&["edit", "view"]));
        assert_eq!(root.children[0].meta.path, "/user");
    }

    #[test]
    fn test_group_direct_grant_without_roles() {
        let svc = test_service();
        let p = svc.create_privilege(privilege("dictionary", None)).unwrap();
        let g = svc.create_group(CreateGroup { name: "ops".into(), ..Default::default() }).unwrap();
        join(&svc, &g.id, "bob");
        svc.relate_group_privilege(&g.id, &p.id, Some("create")).unwrap();

        let forest = svc.privilege_tree_of("bob").unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].meta.actions, actions(&["create"]));
    }

    #[test]
    fn test_direct_role_membership() {
        let svc = test_service();
        let p = svc.create_privilege(privilege("message", None)).unwrap();
        let r = svc.create_role(CreateRole { name: "reader".into(), ..Default::default() }).unwrap();
        hold(&svc, &r.id, "carol");
        svc.relate_role_privilege(&r.id, &p.id, None).unwrap();

        let resolved = svc.resolve_privileges("carol").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].privilege.id, p.id);
        assert!(resolved[0].actions.is_empty());
    }

    #[test]
    fn test_disabled_privilege_never_resolved() {
        let svc = test_service();
        let p = svc.create_privilege(privilege("audit", None)).unwrap();
        let g = svc.create_group(CreateGroup { name: "G".into(), ..Default::default() }).unwrap();
        join(&svc, &g.id, "dave");
        svc.relate_group_privilege(&g.id, &p.id, Some("view")).unwrap();
        svc.enable_privilege(&p.id).unwrap();

        assert!(svc.privilege_tree_of("dave").unwrap().is_empty());
    }

    #[test]
    fn test_ancestor_fill_has_no_actions() {
        let svc = test_service();
        let root = svc.create_privilege(privilege("system", None)).unwrap();
        let mid = svc.create_privilege(privilege("access", Some(&root.id))).unwrap();
        let leaf = svc.create_privilege(privilege("role", Some(&mid.id))).unwrap();
        let g = svc.create_group(CreateGroup { name: "G".into(), ..Default::default() }).unwrap();
        join(&svc, &g.id, "erin");
        svc.relate_group_privilege(&g.id, &leaf.id, Some("modify")).unwrap();

        let forest = svc.privilege_tree_of("erin").unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, root.id);
        let mid_node = &forest[0].children[0];
        assert_eq!(mid_node.id, mid.id);
        assert!(mid_node.meta.actions.is_empty());
        assert_eq!(mid_node.children[0].meta.actions, actions(&["modify"]));
    }

    #[test]
    fn test_direct_grant_on_ancestor_keeps_actions() {
        let svc = test_service();
        let parent = svc.create_privilege(privilege("system", None)).unwrap();
        let child = svc.create_privilege(privilege("user", Some(&parent.id))).unwrap();
        let g = svc.create_group(CreateGroup { name: "G".into(), ..Default::default() }).unwrap();
        join(&svc, &g.id, "frank");
        svc.relate_group_privilege(&g.id, &child.id, Some("view")).unwrap();
        svc.relate_group_privilege(&g.id, &parent.id, Some("export")).unwrap();

        let forest = svc.privilege_tree_of("frank").unwrap();
        assert_eq!(forest[0].meta.actions, actions(&["export"]));
        assert_eq!(forest[0].children[0].meta.actions, actions(&["view"]));
    }

    #[test]
    fn test_disabled_ancestor_promotes_child_to_root() {
        let svc = test_service();
        let top = svc.create_privilege(privilege("system", None)).unwrap();
        let hidden = svc.create_privilege(privilege("access", Some(&top.id))).unwrap();
        let leaf = svc.create_privilege(privilege("group", Some(&hidden.id))).unwrap();
        svc.enable_privilege(&hidden.id).unwrap();

        let g = svc.create_group(CreateGroup { name: "G".into(), ..Default::default() }).unwrap();
        join(&svc, &g.id, "gina");
        svc.relate_group_privilege(&g.id, &leaf.id, Some("view")).unwrap();

        let forest = svc.privilege_tree_of("gina").unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, leaf.id);
        assert!(forest[0].children.is_empty());
        // The walk stops at the disabled hop; its enabled superior is not pulled in.
        assert!(find(&forest, "system").is_none());
        assert!(find(&forest, "access").is_none());
    }

    #[test]
    fn test_pass_cap_bounds_ancestor_walk() {
        use hypervisor_sql::SqliteStore;
        use std::sync::Arc;

        use crate::service::{AdminConfig, AdminService};

        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let svc = AdminService::new(sql, AdminConfig { max_closure_passes: 1 }).unwrap();
        let a = svc.create_privilege(privilege("a", None)).unwrap();
        let b = svc.create_privilege(privilege("b", Some(&a.id))).unwrap();
        let c = svc.create_privilege(privilege("c", Some(&b.id))).unwrap();
        let g = svc.create_group(CreateGroup { name: "G".into(), ..Default::default() }).unwrap();
        join(&svc, &g.id, "hank");
        svc.relate_group_privilege(&g.id, &c.id, None).unwrap();

        let resolved = svc.resolve_privileges("hank").unwrap();
        let names: Vec<&str> = resolved.iter().map(|r| r.privilege.name.as_str()).collect();
        assert_eq!(resolved.len(), 2);
        assert!(names.contains(&"b") && names.contains(&"c"));

        let forest = svc.privilege_tree_of("hank").unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].name, "b");
    }

    #[test]
    fn test_superior_cycle_terminates_and_emits_each_node_once() {
        use hypervisor_sql::{Executor, Value};

        let svc = test_service();
        let a = svc.create_privilege(privilege("a", None)).unwrap();
        let b = svc.create_privilege(privilege("b", Some(&a.id))).unwrap();
        // Close a -> b -> a behind the service's cycle check.
        svc.sql
            .exec(
                "UPDATE privileges SET superior_id = ?1, data = json_set(data, '$.superior_id', ?1) \
                 WHERE id = ?2",
                &[Value::from(b.id.as_str()), Value::from(a.id.as_str())],
            )
            .unwrap();
        assert_eq!(svc.fetch_privilege(&a.id).unwrap().superior_id.as_deref(), Some(b.id.as_str()));

        let g = svc.create_group(CreateGroup { name: "G".into(), ..Default::default() }).unwrap();
        join(&svc, &g.id, "ivy");
        svc.relate_group_privilege(&g.id, &b.id, Some("view")).unwrap();

        let resolved = svc.resolve_privileges("ivy").unwrap();
        assert_eq!(resolved.len(), 2);

        let forest = svc.privilege_tree_of("ivy").unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].name, "a");
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].name, "b");
        assert!(forest[0].children[0].children.is_empty());
        assert_eq!(forest[0].children[0].meta.actions, actions(&["view"]));
    }
}
