//! Data-access collaborators of the resolver and the grant manager.
//!
//! The traits are implemented for every [`hypervisor_sql::Executor`], so the
//! same code runs against the store directly and inside a transaction.

pub(crate) mod records;
mod sql;

use std::collections::BTreeSet;

use crate::model::{GroupPrivilege, Privilege, RolePrivilege};
use crate::service::AdminError;

/// The holder side of a grant edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder<'a> {
    Role(&'a str),
    Group(&'a str),
}

impl<'a> Holder<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            Holder::Role(id) | Holder::Group(id) => id,
        }
    }

    pub(crate) fn grant_table(&self) -> &'static str {
        match self {
            Holder::Role(_) => "role_privileges",
            Holder::Group(_) => "group_privileges",
        }
    }

    pub(crate) fn holder_column(&self) -> &'static str {
        match self {
            Holder::Role(_) => "role_id",
            Holder::Group(_) => "group_id",
        }
    }
}

/// A grant row independent of which holder table it lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub id: String,
    pub holder_id: String,
    pub privilege_id: String,
    pub actions: BTreeSet<String>,
}

impl From<Grant> for RolePrivilege {
    fn from(g: Grant) -> Self {
        RolePrivilege {
            id: g.id,
            role_id: g.holder_id,
            privilege_id: g.privilege_id,
            actions: g.actions,
        }
    }
}

impl From<Grant> for GroupPrivilege {
    fn from(g: Grant) -> Self {
        GroupPrivilege {
            id: g.id,
            group_id: g.holder_id,
            privilege_id: g.privilege_id,
            actions: g.actions,
        }
    }
}

/// Privilege lookups.
pub trait PrivilegeStore {
    /// Load every privilege whose id is in `ids`, enabled or not.
    fn privileges_by_ids(&self, ids: &[String]) -> Result<Vec<Privilege>, AdminError>;

    /// Direct children of `superior_id`, or the top level when `None`.
    fn privileges_by_superior(
        &self,
        superior_id: Option<&str>,
    ) -> Result<Vec<Privilege>, AdminError>;

    fn privilege_by_id(&self, id: &str) -> Result<Option<Privilege>, AdminError>;
}

/// Membership edges and grant rows.
pub trait GrantStore {
    fn group_ids_of_user(&self, username: &str) -> Result<Vec<String>, AdminError>;

    fn role_ids_of_user(&self, username: &str) -> Result<Vec<String>, AdminError>;

    fn role_ids_of_group(&self, group_id: &str) -> Result<Vec<String>, AdminError>;

    fn group_ids_with_role(&self, role_id: &str) -> Result<Vec<String>, AdminError>;

    fn grants_of(&self, holder: Holder<'_>) -> Result<Vec<Grant>, AdminError>;

    fn grant(&self, holder: Holder<'_>, privilege_id: &str) -> Result<Option<Grant>, AdminError>;

    /// Insert the grant, or overwrite the row with the same id.
    fn save_grant(&self, holder: Holder<'_>, grant: &Grant) -> Result<(), AdminError>;

    fn delete_grant(&self, holder: Holder<'_>, id: &str) -> Result<(), AdminError>;
}

/// The denormalized `group_id -> authority` index.
pub trait AuthorityIndex {
    fn authorities_of_group(&self, group_id: &str) -> Result<Vec<String>, AdminError>;

    /// Insert the pair unless present. Returns whether a row was added.
    fn add_authority(&self, group_id: &str, authority: &str) -> Result<bool, AdminError>;

    fn remove_authority(&self, group_id: &str, authority: &str) -> Result<u64, AdminError>;

    /// Remove the bare `name` authority and every `name:{action}` one.
    fn remove_authorities_of(&self, group_id: &str, name: &str) -> Result<u64, AdminError>;

    fn clear_authorities(&self, group_id: &str) -> Result<u64, AdminError>;
}
