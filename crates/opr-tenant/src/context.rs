//! Everything one running tenant needs to serve requests: its config, its
//! offer model, its signing key, and the pluggable pieces (JWKS resolver,
//! ACL) the authenticated request flow consults.

use std::sync::Arc;

use jsonwebtoken::jwk::JwkSet;

use opr_chain::{JwksResolver, TenantSigningKey};
use opr_core::clock::Clock;
use opr_core::OprResult;
use opr_model::OfferModel;
use opr_orgconfig::OrgConfig;

use crate::acl::AccessControlList;
use crate::config::TenantConfig;

/// A live tenant node. Constructed once at startup (or manifest load) and
/// shared across every request for that tenant via `Arc`.
pub struct TenantContext {
    pub config: TenantConfig,
    pub model: OfferModel,
    pub signer: Option<TenantSigningKey>,
    pub jwks_resolver: Arc<dyn JwksResolver>,
    pub acl: Arc<dyn AccessControlList>,
    pub clock: Arc<dyn Clock>,
    /// This tenant's own published public keyset, served at `jwksPath` when
    /// `config.jwks_local` is set. A signing key carries no public-JWK
    /// derivation, so the keyset is supplied as operator data rather than
    /// computed from `signer`.
    pub local_jwks: Option<JwkSet>,
}

impl std::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContext").field("config", &self.config).finish_non_exhaustive()
    }
}

impl TenantContext {
    pub fn new(
        config: TenantConfig,
        model: OfferModel,
        signer: Option<TenantSigningKey>,
        jwks_resolver: Arc<dyn JwksResolver>,
        acl: Arc<dyn AccessControlList>,
        clock: Arc<dyn Clock>,
        local_jwks: Option<JwkSet>,
    ) -> Self {
        Self { config, model, signer, jwks_resolver, acl, clock, local_jwks }
    }

    /// The document this tenant publishes at its `orgFilePath`: endpoint
    /// URLs computed by resolving each configured path against `urlRoot`.
    pub fn org_config(&self) -> OrgConfig {
        let c = &self.config;
        OrgConfig {
            name: c.name.clone(),
            organization_url: c.host_org_url.clone(),
            enrollment_url: c.enrollment_url.clone(),
            jwks_url: Some(if c.jwks_local {
                c.endpoint_url(&c.jwks_path)
            } else {
                c.external_jwks_url.clone().unwrap_or_default()
            }),
            list_products_endpoint_url: Some(c.endpoint_url(&c.list_products_path)),
            accept_products_endpoint_url: Some(c.endpoint_url(&c.accept_product_path)),
            reject_products_endpoint_url: Some(c.endpoint_url(&c.reject_product_path)),
            reserve_products_endpoint_url: Some(c.endpoint_url(&c.reserve_product_path)),
            accept_history_endpoint_url: Some(c.endpoint_url(&c.history_path)),
            scopes_supported: if c.scopes_disabled {
                Vec::new()
            } else {
                vec!["LISTPRODUCTS".to_string(), "ACCEPTPRODUCT".to_string(), "PRODUCTHISTORY".to_string()]
            },
        }
    }

    /// Tears down this tenant's integrations. Change-handler registrations
    /// live on `self.model` and are released when the context is dropped;
    /// offer state itself is held in `Storage`, which outlives the
    /// context, so there is no buffered state of this context's own to
    /// commit.
    pub async fn destroy(&self) -> OprResult<()> {
        Ok(())
    }
}
