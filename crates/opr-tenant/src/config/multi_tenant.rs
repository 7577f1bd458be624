//! Loading configuration for every tenant a single process hosts: one
//! node is a multi-tenant HTTP service that can host many tenant nodes.
//! One manifest file lists every tenant this process should construct a
//! [`crate::context::TenantContext`] for.

use serde::Deserialize;

use opr_core::error::codes;
use opr_core::{OprResult, StatusError};

use crate::config::TenantConfig;

/// One entry of a multi-tenant deployment manifest: the path segment this
/// tenant is reachable under (e.g. `/t/acme/...`) plus its own config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantManifestEntry {
    pub tenant_id: String,
    #[serde(flatten)]
    pub config: TenantConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TenantManifest {
    #[serde(default)]
    pub tenants: Vec<TenantManifestEntry>,
}

impl TenantManifest {
    pub fn load(config_path: &str) -> OprResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
            .map_err(|e| {
                StatusError::internal(codes::CONFIG_MISSING_FIELD, format!("failed to load tenant manifest: {e}"))
            })?;

        settings.try_deserialize().map_err(|e| {
            StatusError::internal(codes::CONFIG_MISSING_FIELD, format!("invalid tenant manifest: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_deserializes_to_no_tenants() {
        let manifest: TenantManifest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(manifest.tenants.is_empty());
    }
}
