//! The authenticated request flow, split by concern: bearer parsing and
//! scope checks in [`auth`], ACL and reshare-chain authorization in
//! [`authz`].

pub mod auth;
pub mod authz;

pub use auth::{authenticate, extract_bearer, require_scope, AuthenticatedRequest};
pub use authz::{authorize_with_optional_chain, require_acl};
