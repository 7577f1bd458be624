//! Wires a [`TenantConfig`] into a running [`TenantContext`]: a shared
//! [`OrgConfigResolver`] backs JWKS lookups over HTTP, and the caller
//! supplies the storage, listing policy, signing key, and ACL a tenant
//! needs, since those are deployment-specific choices this crate doesn't
//! make on an operator's behalf.

use std::sync::Arc;

use jsonwebtoken::jwk::JwkSet;

use opr_chain::TenantSigningKey;
use opr_core::clock::{Clock, SystemClock};
use opr_model::OfferModel;
use opr_orgconfig::OrgConfigResolver;
use opr_policy::ListingPolicy;
use opr_storage::Storage;

use crate::acl::AccessControlList;
use crate::config::TenantConfig;
use crate::context::TenantContext;

/// Build a [`TenantContext`] that resolves peer JWKS over real HTTP via a
/// shared [`OrgConfigResolver`], running on the system wall clock.
pub fn build_tenant(
    config: TenantConfig,
    storage: Arc<dyn Storage>,
    listing_policy: Arc<dyn ListingPolicy>,
    signer: Option<TenantSigningKey>,
    acl: Arc<dyn AccessControlList>,
    resolver: Arc<OrgConfigResolver>,
    local_jwks: Option<JwkSet>,
) -> TenantContext {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let model = OfferModel::new(config.host_org_url.clone(), storage, listing_policy, signer.clone(), clock.clone());
    TenantContext::new(config, model, signer, resolver, acl, clock, local_jwks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AllowAllAcl;
    use opr_policy::UniversalAcceptPolicy;
    use opr_storage::memory::InMemoryStorage;

    #[test]
    fn build_tenant_publishes_configured_org_url() {
        let config = TenantConfig {
            host_org_url: "https://host.example/org.json".into(),
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
        let resolver = Arc::new(OrgConfigResolver::new(reqwest::Client::new()));
        let tenant = build_tenant(config, storage, policy, None, Arc::new(AllowAllAcl), resolver, None);
        assert_eq!(tenant.org_config().organization_url, "https://host.example/org.json");
    }
}
