use hypervisor_core::{ListParams, ListResult, new_id, now_rfc3339};
use hypervisor_sql::{Executor, Value, with_transaction};
use tracing::info;

use crate::model::{CreatePrivilege, ModifyPrivilege, Privilege, PrivilegeNode};
use crate::service::authority::{groups_reaching, rebuild_authorities};
use crate::service::forest::build_forest;
use crate::service::{AdminError, AdminService, page, require};
use crate::store::records;
use crate::store::PrivilegeStore;

const TABLE: &str = "privileges";
const SORTABLE: &[&str] = &["name", "created_at", "updated_at"];

fn indexes(p: &Privilege) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::from(p.name.as_str())),
        ("superior_id", Value::from(p.superior_id.as_deref())),
        ("enabled", Value::from(p.enabled)),
        ("updated_at", Value::from(p.updated_at.as_str())),
    ]
}

fn build(input: CreatePrivilege) -> Privilege {
    let now = now_rfc3339();
    Privilege {
        id: new_id(),
        name: input.name,
        superior_id: input.superior_id.filter(|s| !s.is_empty()),
        path: input.path,
        icon: input.icon,
        redirect: input.redirect,
        component: input.component,
        description: input.description,
        enabled: true,
        created_at: now.clone(),
        updated_at: now,
    }
}

fn insert<E: Executor + ?Sized>(db: &E, privilege: &Privilege) -> Result<(), AdminError> {
    let mut idx = indexes(privilege);
    idx.push(("created_at", Value::from(privilege.created_at.as_str())));
    records::insert(db, TABLE, &privilege.id, privilege, &idx)
}

impl AdminService {
    /// Create a privilege. Names are unique across the whole forest.
    pub fn create_privilege(&self, input: CreatePrivilege) -> Result<Privilege, AdminError> {
        require(&input.name, "privilege name")?;
        if self.privilege_exists(&input.name, None)? {
            return Err(AdminError::Conflict(format!("privilege {} already exists", input.name)));
        }

        let privilege = build(input);
        insert(self.sql.as_ref(), &privilege)?;
        info!("created privilege {} ({})", privilege.name, privilege.id);
        Ok(privilege)
    }

    /// Bulk import. Either every privilege is created or none is.
    pub fn create_privileges(&self, inputs: Vec<CreatePrivilege>) -> Result<Vec<Privilege>, AdminError> {
        for input in &inputs {
            require(&input.name, "privilege name")?;
        }
        let created = with_transaction(self.sql.as_ref(), |tx| {
            let mut created = Vec::with_capacity(inputs.len());
            for input in inputs {
                let privilege = build(input);
                insert(tx, &privilege)?;
                created.push(privilege);
            }
            Ok::<_, AdminError>(created)
        })?;
        info!("imported {} privileges", created.len());
        Ok(created)
    }

    pub fn fetch_privilege(&self, id: &str) -> Result<Privilege, AdminError> {
        records::fetch(self.sql.as_ref(), TABLE, id)
    }

    pub fn retrieve_privileges(&self, params: &ListParams) -> Result<ListResult<Privilege>, AdminError> {
        let (items, total) = records::list(self.sql.as_ref(), TABLE, &[], params, SORTABLE)?;
        Ok(page(items, total, params))
    }

    /// Whether another privilege already uses `name`.
    pub fn privilege_exists(&self, name: &str, exclude_id: Option<&str>) -> Result<bool, AdminError> {
        records::exists(self.sql.as_ref(), TABLE, "name", name, exclude_id, &[])
    }

    /// Apply a partial update.
    ///
    /// A rename re-derives the authority index of every group that reaches
    /// this privilege, since authorities embed the name.
    pub fn modify_privilege(&self, id: &str, patch: ModifyPrivilege) -> Result<Privilege, AdminError> {
        let mut privilege = self.fetch_privilege(id)?;
        let old_name = privilege.name.clone();

        if let Some(Some(superior)) = &patch.superior_id {
            if !superior.is_empty() && privilege.superior_id.as_deref() != Some(superior.as_str()) {
                self.check_superior(TABLE, id, superior)?;
            }
        }

        privilege.apply(patch);
        privilege.superior_id = privilege.superior_id.filter(|s| !s.is_empty());
        require(&privilege.name, "privilege name")?;
        let renamed = privilege.name != old_name;
        if renamed && self.privilege_exists(&privilege.name, Some(id))? {
            return Err(AdminError::Conflict(format!("privilege {} already exists", privilege.name)));
        }
        privilege.updated_at = now_rfc3339();

        with_transaction(self.sql.as_ref(), |tx| {
            records::update(tx, TABLE, id, &privilege, &indexes(&privilege))?;
            if renamed {
                for group_id in groups_reaching(tx, id)? {
                    rebuild_authorities(tx, &group_id)?;
                }
            }
            Ok::<_, AdminError>(())
        })?;
        Ok(privilege)
    }

    /// Delete a leaf privilege together with every grant on it.
    ///
    /// Privileges that still have children are refused with `Conflict`.
    pub fn remove_privilege(&self, id: &str) -> Result<(), AdminError> {
        let privilege = self.fetch_privilege(id)?;
        if !self.sql.privileges_by_superior(Some(id))?.is_empty() {
            return Err(AdminError::Conflict(format!(
                "privilege {} still has children",
                privilege.name
            )));
        }

        with_transaction(self.sql.as_ref(), |tx| {
            let affected = groups_reaching(tx, id)?;
            tx.exec("DELETE FROM role_privileges WHERE privilege_id = ?1", &[Value::from(id)])?;
            tx.exec("DELETE FROM group_privileges WHERE privilege_id = ?1", &[Value::from(id)])?;
            records::delete(tx, TABLE, id)?;
            for group_id in affected {
                rebuild_authorities(tx, &group_id)?;
            }
            Ok::<_, AdminError>(())
        })?;
        info!("removed privilege {} ({})", privilege.name, id);
        Ok(())
    }

    /// Flip the enabled flag and return the updated privilege.
    pub fn enable_privilege(&self, id: &str) -> Result<Privilege, AdminError> {
        let mut privilege = self.fetch_privilege(id)?;
        privilege.enabled = !privilege.enabled;
        privilege.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &privilege, &indexes(&privilege))?;
        Ok(privilege)
    }

    /// Direct children of `superior_id`, or the top level when `None`.
    pub fn privilege_subset(&self, superior_id: Option<&str>) -> Result<Vec<Privilege>, AdminError> {
        self.sql.privileges_by_superior(superior_id.filter(|s| !s.is_empty()))
    }

    /// Every privilege, enabled or not, as a forest without actions.
    pub fn privilege_tree(&self) -> Result<Vec<PrivilegeNode>, AdminError> {
        let all: Vec<Privilege> = records::all(self.sql.as_ref(), TABLE, &[])?;
        Ok(build_forest(all.into_iter().map(PrivilegeNode::from).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CreateGroup;
    use crate::service::test_support::test_service;

    fn named(name: &str, superior_id: Option<&str>) -> CreatePrivilege {
        CreatePrivilege {
            name: name.to_string(),
            superior_id: superior_id.map(str::to_string),
            path: format!("/{}", name),
            ..Default::default()
        }
    }

    #[test]
    fn test_privilege_crud() {
        let svc = test_service();

        let p = svc
            .create_privilege(CreatePrivilege {
                icon: Some("gear".into()),
                ..named("system", None)
            })
            .unwrap();
        assert!(p.enabled);
        assert_eq!(p.id.len(), 32);

        let fetched = svc.fetch_privilege(&p.id).unwrap();
        assert_eq!(fetched, p);

        let modified = svc
            .modify_privilege(
                &p.id,
                ModifyPrivilege {
                    path: Some("/sys".into()),
                    icon: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(modified.path, "/sys");
        assert_eq!(modified.icon, None);
        assert_eq!(modified.name, "system");

        let list = svc.retrieve_privileges(&ListParams::default()).unwrap();
        assert_eq!(list.total, 1);

        svc.remove_privilege(&p.id).unwrap();
        assert!(matches!(svc.fetch_privilege(&p.id), Err(AdminError::NotFound(_))));
        assert!(matches!(svc.remove_privilege(&p.id), Err(AdminError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let svc = test_service();
        let a = svc.create_privilege(named("user", None)).unwrap();
        let b = svc.create_privilege(named("role", None)).unwrap();

        assert!(matches!(svc.create_privilege(named("user", None)), Err(AdminError::Conflict(_))));
        assert!(svc.privilege_exists("user", None).unwrap());
        assert!(!svc.privilege_exists("user", Some(&a.id)).unwrap());

        let renamed = svc.modify_privilege(
            &b.id,
            ModifyPrivilege { name: Some("user".into()), ..Default::default() },
        );
        assert!(matches!(renamed, Err(AdminError::Conflict(_))));

        // Keeping the same name is not a conflict with itself.
        svc.modify_privilege(&a.id, ModifyPrivilege { name: Some("user".into()), ..Default::default() })
            .unwrap();
    }

    #[test]
    fn test_superior_cycle_rejected() {
        let svc = test_service();
        let a = svc.create_privilege(named("a", None)).unwrap();
        let b = svc.create_privilege(named("b", Some(&a.id))).unwrap();

        let to_self = svc.modify_privilege(
            &a.id,
            ModifyPrivilege { superior_id: Some(Some(a.id.clone())), ..Default::default() },
        );
        assert!(matches!(to_self, Err(AdminError::InvalidArgument(_))));

        let to_child = svc.modify_privilege(
            &a.id,
            ModifyPrivilege { superior_id: Some(Some(b.id.clone())), ..Default::default() },
        );
        assert!(matches!(to_child, Err(AdminError::InvalidArgument(_))));

        let to_missing = svc.modify_privilege(
            &b.id,
            ModifyPrivilege { superior_id: Some(Some("nope".into())), ..Default::default() },
        );
        assert!(matches!(to_missing, Err(AdminError::NotFound(_))));

        let detached = svc
            .modify_privilege(&b.id, ModifyPrivilege { superior_id: Some(None), ..Default::default() })
            .unwrap();
        assert!(detached.superior_id.is_none());
    }

    #[test]
    fn test_remove_refuses_parent_and_cleans_grants() {
        let svc = test_service();
        let parent = svc.create_privilege(named("system", None)).unwrap();
        let child = svc.create_privilege(named("user", Some(&parent.id))).unwrap();
        let g = svc.create_group(CreateGroup { name: "ops".into(), ..Default::default() }).unwrap();
        svc.relate_group_privilege(&g.id, &child.id, Some("edit")).unwrap();

        assert!(matches!(svc.remove_privilege(&parent.id), Err(AdminError::Conflict(_))));

        svc.remove_privilege(&child.id).unwrap();
        assert!(svc.group_privileges(&g.id).unwrap().is_empty());
        assert!(svc.group_authorities(&g.id).unwrap().is_empty());
        svc.remove_privilege(&parent.id).unwrap();
    }

    #[test]
    fn test_rename_rewrites_authorities() {
        let svc = test_service();
        let p = svc.create_privilege(named("user", None)).unwrap();
        let g = svc.create_group(CreateGroup { name: "ops".into(), ..Default::default() }).unwrap();
        svc.relate_group_privilege(&g.id, &p.id, Some("edit")).unwrap();

        svc.modify_privilege(&p.id, ModifyPrivilege { name: Some("member".into()), ..Default::default() })
            .unwrap();
        assert_eq!(svc.group_authorities(&g.id).unwrap(), vec!["member", "member:edit"]);
    }

    #[test]
    fn test_enable_toggles() {
        let svc = test_service();
        let p = svc.create_privilege(named("log", None)).unwrap();
        assert!(!svc.enable_privilege(&p.id).unwrap().enabled);
        assert!(svc.enable_privilege(&p.id).unwrap().enabled);
        assert!(matches!(svc.enable_privilege("missing"), Err(AdminError::NotFound(_))));
    }

    #[test]
    fn test_bulk_import_is_atomic() {
        let svc = test_service();
        svc.create_privilege(named("user", None)).unwrap();

        let failed = svc.create_privileges(vec![named("role", None), named("user", None)]);
        assert!(matches!(failed, Err(AdminError::Conflict(_))));
        assert!(!svc.privilege_exists("role", None).unwrap());

        let created = svc.create_privileges(vec![named("role", None), named("group", None)]).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(svc.retrieve_privileges(&ListParams::default()).unwrap().total, 3);
    }

    #[test]
    fn test_subset_and_tree() {
        let svc = test_service();
        let root = svc.create_privilege(named("system", None)).unwrap();
        svc.create_privilege(named("user", Some(&root.id))).unwrap();
        svc.create_privilege(named("role", Some(&root.id))).unwrap();
        let hidden = svc.create_privilege(named("audit", None)).unwrap();
        svc.enable_privilege(&hidden.id).unwrap();

        let top: Vec<String> = svc.privilege_subset(None).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(top, vec!["system", "audit"]);
        assert_eq!(svc.privilege_subset(Some(&root.id)).unwrap().len(), 2);

        let tree = svc.privilege_tree().unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "audit");
        let kids: Vec<&str> = tree[1].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(kids, vec!["role", "user"]);
    }

    #[test]
    fn test_paging_and_sorting() {
        let svc = test_service();
        for name in ["c", "a", "b"] {
            svc.create_privilege(named(name, None)).unwrap();
        }
        let params = ListParams {
            page: 0,
            size: 2,
            sort_by: Some("name".into()),
            descending: true,
        };
        let first = svc.retrieve_privileges(&params).unwrap();
        assert_eq!(first.total, 3);
        let names: Vec<&str> = first.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);

        let second = svc.retrieve_privileges(&ListParams { page: 1, ..params }).unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].name, "a");
    }
}
