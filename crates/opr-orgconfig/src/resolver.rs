//! Resolves a peer org's published config and JWKS, caching both
//! process-wide with per-key replacement on refetch. Per the network's
//! staleness model, entries are never evicted on a timer - an operator
//! who wants to force key rotation restarts the process.

use std::sync::Arc;

use dashmap::DashMap;
use jsonwebtoken::jwk::JwkSet;
use tracing::{debug, info, warn};

use opr_chain::JwksResolver;
use opr_core::error::codes;
use opr_core::{OprResult, StatusError};

use crate::types::{IdentityUrlMapper, OrgConfig, UrlMapper};

/// Fetches and caches org config and JWKS documents over HTTP.
pub struct OrgConfigResolver {
    http: reqwest::Client,
    mapper: Arc<dyn UrlMapper>,
    org_cache: DashMap<String, Arc<OrgConfig>>,
    jwks_cache: DashMap<String, JwkSet>,
}

impl OrgConfigResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            mapper: Arc::new(IdentityUrlMapper),
            org_cache: DashMap::new(),
            jwks_cache: DashMap::new(),
        }
    }

    pub fn with_mapper(http: reqwest::Client, mapper: Arc<dyn UrlMapper>) -> Self {
        Self {
            http,
            mapper,
            org_cache: DashMap::new(),
            jwks_cache: DashMap::new(),
        }
    }

    /// Fetch (or return the cached copy of) `orgUrl`'s published config.
    pub async fn get(&self, org_url: &str) -> OprResult<Arc<OrgConfig>> {
        if let Some(cached) = self.org_cache.get(org_url) {
            debug!(org_url, "org config cache hit");
            return Ok(Arc::clone(cached.value()));
        }

        let mapped = self.mapper.map(org_url);
        info!(org_url, mapped_url = %mapped, "fetching org config");

        let response = self.http.get(&mapped).send().await.map_err(|e| {
            StatusError::internal(codes::AUTH_ERROR, format!("failed to fetch org config: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(StatusError::internal(
                codes::AUTH_ERROR,
                format!("org config endpoint returned status {}", response.status()),
            ));
        }

        let config: OrgConfig = response.json().await.map_err(|e| {
            StatusError::internal(codes::AUTH_ERROR, format!("invalid org config JSON: {e}"))
        })?;

        let config = Arc::new(config);
        self.org_cache.insert(org_url.to_string(), Arc::clone(&config));
        Ok(config)
    }

    /// Fetch (or return the cached copy of) `orgUrl`'s JWKS, by way of the
    /// `jwksURL` declared in its org config.
    pub async fn get_jwks(&self, org_url: &str) -> OprResult<JwkSet> {
        if let Some(cached) = self.jwks_cache.get(org_url) {
            debug!(org_url, "jwks cache hit");
            return Ok(cached.value().clone());
        }

        let config = self.get(org_url).await?;
        let jwks_url = config.jwks_url.as_deref().ok_or_else(|| {
            StatusError::bad_request(
                codes::NO_KEYSET_SPECIFIED,
                format!("org '{org_url}' declares no jwksURL"),
            )
        })?;

        let mapped = self.mapper.map(jwks_url);
        info!(org_url, jwks_url = %mapped, "fetching jwks");

        let response = self.http.get(&mapped).send().await.map_err(|e| {
            StatusError::internal(codes::AUTH_ERROR, format!("failed to fetch jwks: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(StatusError::internal(
                codes::AUTH_ERROR,
                format!("jwks endpoint returned status {}", response.status()),
            ));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            warn!(org_url, error = %e, "jwks response failed validation");
            StatusError::internal(codes::AUTH_ERROR, format!("invalid jwks JSON: {e}"))
        })?;

        self.jwks_cache.insert(org_url.to_string(), jwks.clone());
        Ok(jwks)
    }
}

#[async_trait::async_trait]
impl JwksResolver for OrgConfigResolver {
    async fn get_jwks(&self, org_url: &str) -> OprResult<JwkSet> {
        OrgConfigResolver::get_jwks(self, org_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_jwks_url_fails_with_no_keyset_specified() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/org.json"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Acme",
                "organizationURL": format!("{}/org.json", server.uri()),
                "scopesSupported": [],
            })))
            .mount(&server)
            .await;

        let resolver = OrgConfigResolver::new(reqwest::Client::new());
        let org_url = format!("{}/org.json", server.uri());
        let err = resolver.get_jwks(&org_url).await.unwrap_err();
        assert_eq!(err.code, codes::NO_KEYSET_SPECIFIED);
    }

    #[tokio::test]
    async fn caches_org_config_across_calls() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/org.json"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Acme",
                "organizationURL": format!("{}/org.json", server.uri()),
                "scopesSupported": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = OrgConfigResolver::new(reqwest::Client::new());
        let org_url = format!("{}/org.json", server.uri());
        resolver.get(&org_url).await.unwrap();
        resolver.get(&org_url).await.unwrap();
    }
}
