//! Looks up a running tenant by its host org URL. A process may host more
//! than one tenant node behind a single listener, each reachable under
//! its own URL root.

use std::sync::Arc;

use dashmap::DashMap;

use opr_core::error::codes;
use opr_core::{OprResult, StatusError};

use crate::context::TenantContext;

#[derive(Default)]
pub struct TenantRegistry {
    tenants: DashMap<String, Arc<TenantContext>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, host_org_url: impl Into<String>, context: Arc<TenantContext>) {
        self.tenants.insert(host_org_url.into(), context);
    }

    pub fn get(&self, host_org_url: &str) -> OprResult<Arc<TenantContext>> {
        self.tenants
            .get(host_org_url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                StatusError::not_found(codes::UNKNOWN_TENANT, format!("no tenant registered for '{host_org_url}'"))
            })
    }

    pub fn iter(&self) -> Vec<(String, Arc<TenantContext>)> {
        self.tenants.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    pub async fn destroy_all(&self) -> OprResult<()> {
        for entry in self.tenants.iter() {
            entry.value().destroy().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AllowAllAcl;
    use async_trait::async_trait;
    use jsonwebtoken::jwk::JwkSet;
    use opr_chain::JwksResolver;
    use opr_core::clock::FixedClock;
    use opr_model::OfferModel;
    use opr_policy::UniversalAcceptPolicy;
    use opr_storage::memory::InMemoryStorage;

    struct NoJwks;

    #[async_trait]
    impl JwksResolver for NoJwks {
        async fn get_jwks(&self, _org_url: &str) -> OprResult<JwkSet> {
            Ok(JwkSet { keys: vec![] })
        }
    }

    fn context(host_org_url: &str) -> Arc<TenantContext> {
        let config = crate::config::TenantConfig {
            host_org_url: host_org_url.to_string(),
            url_root: "https://host.example".into(),
            name: "Acme".into(),
            enrollment_url: None,
            org_file_path: "/org.json".into(),
            list_products_path: "/listProducts".into(),
            accept_product_path: "/acceptProduct".into(),
            reject_product_path: "/rejectProduct".into(),
            reserve_product_path: "/reserveProduct".into(),
            history_path: "/history".into(),
            jwks_local: true,
            jwks_path: "/jwks.json".into(),
            external_jwks_url: None,
            scopes_disabled: false,
            strict_correctness_mode: false,
        };
        let storage = Arc::new(InMemoryStorage::new());
        let policy = Arc::new(UniversalAcceptPolicy::new(vec![]));
        let clock = Arc::new(FixedClock::new(0));
        let model = OfferModel::new(config.host_org_url.clone(), storage, policy, None, clock.clone());
        Arc::new(TenantContext::new(config, model, None, Arc::new(NoJwks), Arc::new(AllowAllAcl), clock, None))
    }

    #[test]
    fn unknown_tenant_fails_with_unknown_tenant_code() {
        let registry = TenantRegistry::new();
        let err = registry.get("https://nope.example/org.json").unwrap_err();
        assert_eq!(err.code, codes::UNKNOWN_TENANT);
    }

    #[test]
    fn registered_tenant_is_found_by_host_org_url() {
        let registry = TenantRegistry::new();
        registry.insert("https://host.example/org.json", context("https://host.example/org.json"));
        assert!(registry.get("https://host.example/org.json").is_ok());
    }

    #[tokio::test]
    async fn destroy_all_succeeds_with_no_tenants() {
        let registry = TenantRegistry::new();
        registry.destroy_all().await.unwrap();
    }
}
