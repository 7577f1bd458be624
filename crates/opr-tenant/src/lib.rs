//! The tenant node: federated HTTP handlers for list/accept/reject/
//! reserve/history, the authenticated request flow those handlers run,
//! and the registry that lets one process host more than one tenant.

pub mod acl;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod error_sanitization;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod schema;
pub mod server;

pub use acl::{AccessControlList, AllowAllAcl, AllowListAcl};
pub use bootstrap::build_tenant;
pub use config::TenantConfig;
pub use context::TenantContext;
pub use error::TenantError;
pub use registry::TenantRegistry;
pub use server::{build_app, serve};
