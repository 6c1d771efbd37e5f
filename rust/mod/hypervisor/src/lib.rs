//! Hypervisor module: admin-console privileges, roles, groups and users.
//!
//! # Resources
//!
//! - **Privilege**: menu / resource forest that roles and groups are granted
//! - **Role**: named bundle of grants, attached to groups or held directly
//! - **Group**: organization unit; members inherit its roles and grants
//! - **User**: console profile referenced by username
//! - **Dictionary**, **Message**, **Log**: console bookkeeping
//!
//! Per-user privilege trees are resolved on demand from the grant graph
//! (see [`service::resolver`]). Every grant change also maintains a flat
//! `group -> authority` index used for permission checks.
//!
//! # Usage
//!
//! ```ignore
//! use hypervisor::{HypervisorModule, service::AdminConfig};
//!
//! let module = HypervisorModule::new(sql, AdminConfig::default())?;
//! let router = module.routes(); // already nested under /hypervisor
//! ```

pub mod api;
pub mod model;
pub mod service;
pub mod store;

use std::sync::Arc;

use axum::Router;

use hypervisor_core::{Module, ServiceError};
use hypervisor_sql::SQLStore;

use crate::service::{AdminConfig, AdminService};

/// Hypervisor module implementing the Module trait.
pub struct HypervisorModule {
    service: Arc<AdminService>,
}

impl HypervisorModule {
    pub fn new(sql: Arc<dyn SQLStore>, config: AdminConfig) -> Result<Self, ServiceError> {
        let service = AdminService::new(sql, config)?;
        Ok(Self { service })
    }

    /// Get a reference to the underlying AdminService.
    pub fn service(&self) -> &Arc<AdminService> {
        &self.service
    }
}

impl Module for HypervisorModule {
    fn name(&self) -> &str {
        "hypervisor"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
