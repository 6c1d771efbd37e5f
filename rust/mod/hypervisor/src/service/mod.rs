pub mod schema;
pub mod privilege;
pub mod role;
pub mod group;
pub mod user;
pub mod dictionary;
pub mod message;
pub mod log;
pub mod resolver;
pub mod grant;
pub mod authority;
pub(crate) mod forest;

use std::collections::HashSet;
use std::sync::Arc;

use hypervisor_core::{ListParams, ListResult};
use hypervisor_sql::{Executor, SQLError, SQLStore, Value};
use serde::Serialize;
use thiserror::Error;

/// Hypervisor service error type.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A required identifier was missing or blank.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<SQLError> for AdminError {
    fn from(e: SQLError) -> Self {
        AdminError::Storage(e.to_string())
    }
}

impl From<AdminError> for hypervisor_core::ServiceError {
    fn from(e: AdminError) -> Self {
        use hypervisor_core::ServiceError;
        match e {
            AdminError::NotFound(m) => ServiceError::NotFound(m),
            AdminError::Conflict(m) => ServiceError::Conflict(m),
            AdminError::InvalidArgument(m) => ServiceError::Validation(m),
            AdminError::Storage(m) => ServiceError::Storage(m),
            AdminError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

/// Configuration for the hypervisor service.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Upper bound on ancestor-expansion passes when resolving a privilege
    /// tree. Each pass climbs one level, so this is also the deepest
    /// privilege hierarchy that resolves completely.
    pub max_closure_passes: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            max_closure_passes: 64,
        }
    }
}

/// The hypervisor service. Holds the storage backend and configuration.
pub struct AdminService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) config: AdminConfig,
}

impl AdminService {
    /// Create a new AdminService, initializing the DB schema.
    pub fn new(sql: Arc<dyn SQLStore>, config: AdminConfig) -> Result<Arc<Self>, AdminError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self { sql, config }))
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    /// Reject a `superior_id` that would make `id` its own ancestor.
    ///
    /// Also fails with `NotFound` when `candidate` does not exist in `table`.
    pub(crate) fn check_superior(&self, table: &str, id: &str, candidate: &str) -> Result<(), AdminError> {
        if id == candidate {
            return Err(AdminError::InvalidArgument(format!(
                "{} {} cannot be its own superior",
                table, id
            )));
        }

        let sql = format!("SELECT superior_id FROM {} WHERE id = ?1", table);
        let mut visited = HashSet::from([id.to_string()]);
        let mut current = candidate.to_string();
        let mut first = true;
        loop {
            let rows = self.sql.query(&sql, &[Value::from(current.as_str())])?;
            let Some(row) = rows.first() else {
                if first {
                    return Err(AdminError::NotFound(format!("{}/{}", table, candidate)));
                }
                return Ok(());
            };
            first = false;

            match row.get_str("superior_id") {
                Some(parent) if visited.contains(parent) => {
                    return Err(AdminError::InvalidArgument(format!(
                        "superior {} would create a cycle through {}",
                        candidate, parent
                    )));
                }
                Some(parent) => {
                    visited.insert(parent.to_string());
                    current = parent.to_string();
                }
                None => return Ok(()),
            }
        }
    }
}

pub(crate) fn page<T: Serialize>(items: Vec<T>, total: usize, params: &ListParams) -> ListResult<T> {
    ListResult {
        items,
        total,
        page: params.page,
        size: params.size,
    }
}

/// Reject a missing or blank identifier.
pub(crate) fn require<'a>(value: &'a str, what: &str) -> Result<&'a str, AdminError> {
    if value.trim().is_empty() {
        return Err(AdminError::InvalidArgument(format!("{} must not be blank", what)));
    }
    Ok(value)
}

/// Normalize an optional action: blank or absent means visibility-only.
pub(crate) fn normalize_action(action: Option<&str>) -> Option<&str> {
    action.map(str::trim).filter(|a| !a.is_empty())
}
