//! Per-tenant configuration: host identity, configurable handler paths,
//! and the auth/strict-mode flags the authenticated request flow checks.

use serde::{Deserialize, Serialize};

use opr_core::error::codes;
use opr_core::{OprResult, StatusError};

pub mod multi_tenant;
pub use multi_tenant::{TenantManifest, TenantManifestEntry};

fn default_org_file_path() -> String {
    "/org.json".to_string()
}
fn default_list_products_path() -> String {
    "/listProducts".to_string()
}
fn default_accept_product_path() -> String {
    "/acceptProduct".to_string()
}
fn default_reject_product_path() -> String {
    "/rejectProduct".to_string()
}
fn default_reserve_product_path() -> String {
    "/reserveProduct".to_string()
}
fn default_history_path() -> String {
    "/history".to_string()
}
fn default_jwks_path() -> String {
    "/jwks.json".to_string()
}
fn default_jwks_local() -> bool {
    true
}

/// One tenant's static configuration. Endpoint URLs published in this
/// tenant's `org.json` are computed by resolving these paths against
/// `urlRoot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub host_org_url: String,
    pub url_root: String,
    pub name: String,
    #[serde(default)]
    pub enrollment_url: Option<String>,
    #[serde(default = "default_org_file_path")]
    pub org_file_path: String,
    #[serde(default = "default_list_products_path")]
    pub list_products_path: String,
    #[serde(default = "default_accept_product_path")]
    pub accept_product_path: String,
    #[serde(default = "default_reject_product_path")]
    pub reject_product_path: String,
    #[serde(default = "default_reserve_product_path")]
    pub reserve_product_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
    /// Serve this tenant's own JWKS locally at `jwksPath` rather than
    /// pointing `jwksURL` at an externally hosted keyset.
    #[serde(default = "default_jwks_local")]
    pub jwks_local: bool,
    #[serde(default = "default_jwks_path")]
    pub jwks_path: String,
    /// Used as `jwksURL` verbatim when `jwksLocal` is false.
    #[serde(default)]
    pub external_jwks_url: Option<String>,
    #[serde(default)]
    pub scopes_disabled: bool,
    #[serde(default)]
    pub strict_correctness_mode: bool,
}

impl TenantConfig {
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.url_root.trim_end_matches('/'), path)
    }

    /// Load a tenant configuration from a base file plus environment
    /// overrides prefixed `OPR_TENANT`. This crate only needs the layered
    /// merge, not the pluggable factory/configuration-resolution
    /// mechanism the wider network leaves external.
    pub fn load(config_path: &str) -> OprResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix("OPR_TENANT").separator("__"))
            .build()
            .map_err(|e| {
                StatusError::internal(codes::CONFIG_MISSING_FIELD, format!("failed to load tenant config: {e}"))
            })?;

        settings.try_deserialize().map_err(|e| {
            StatusError::internal(codes::CONFIG_MISSING_FIELD, format!("invalid tenant config: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TenantConfig {
        TenantConfig {
            host_org_url: "https://host.example/org.json".into(),
            url_root: "https://host.example".into(),
            name: "Acme".into(),
            enrollment_url: None,
            org_file_path: default_org_file_path(),
            list_products_path: default_list_products_path(),
            accept_product_path: default_accept_product_path(),
            reject_product_path: default_reject_product_path(),
            reserve_product_path: default_reserve_product_path(),
            history_path: default_history_path(),
            jwks_local: true,
            jwks_path: default_jwks_path(),
            external_jwks_url: None,
            scopes_disabled: false,
            strict_correctness_mode: false,
        }
    }

    #[test]
    fn endpoint_url_joins_root_and_path() {
        let config = config();
        assert_eq!(config.endpoint_url(&config.list_products_path), "https://host.example/listProducts");
    }

    #[test]
    fn endpoint_url_tolerates_trailing_slash_on_root() {
        let mut config = config();
        config.url_root.push('/');
        assert_eq!(config.endpoint_url("/jwks.json"), "https://host.example/jwks.json");
    }
}
