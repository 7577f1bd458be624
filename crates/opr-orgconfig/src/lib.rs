//! Resolving a peer org's published configuration and signing keys.
//!
//! A tenant never talks to a peer's storage or business logic directly -
//! every cross-org call is addressed to an `orgUrl`, and this crate is
//! the only place that turns that URL into a fetched, cached
//! [`OrgConfig`] and, transitively, a [`jsonwebtoken::jwk::JwkSet`].

pub mod resolver;
pub mod types;

pub use resolver::OrgConfigResolver;
pub use types::{IdentityUrlMapper, OrgConfig, UrlMapper};
