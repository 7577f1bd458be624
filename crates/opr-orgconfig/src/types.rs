//! The config document a tenant publishes at its `orgFilePath` endpoint
//! (default `/org.json`).

use serde::{Deserialize, Serialize};

/// A peer org's published configuration: its name, identity URL, and the
/// set of endpoints it exposes. Every endpoint besides `organizationURL`
/// is optional - an org that only posts offers and never accepts them
/// may omit the accept/reject/reserve/history endpoints entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfig {
    pub name: String,
    #[serde(rename = "organizationURL")]
    pub organization_url: String,
    #[serde(rename = "enrollmentURL", skip_serializing_if = "Option::is_none")]
    pub enrollment_url: Option<String>,
    #[serde(rename = "jwksURL", skip_serializing_if = "Option::is_none")]
    pub jwks_url: Option<String>,
    #[serde(
        rename = "listProductsEndpointURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub list_products_endpoint_url: Option<String>,
    #[serde(
        rename = "acceptProductsEndpointURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_products_endpoint_url: Option<String>,
    #[serde(
        rename = "rejectProductsEndpointURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub reject_products_endpoint_url: Option<String>,
    #[serde(
        rename = "reserveProductsEndpointURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub reserve_products_endpoint_url: Option<String>,
    #[serde(
        rename = "acceptHistoryEndpointURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_history_endpoint_url: Option<String>,
    #[serde(rename = "scopesSupported", default)]
    pub scopes_supported: Vec<String>,
}

/// Rewrites URLs before they are dereferenced - tests and local deployments
/// substitute loopback addresses for an org's declared public hostname.
/// Identity by default.
pub trait UrlMapper: Send + Sync {
    fn map(&self, url: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityUrlMapper;

impl UrlMapper for IdentityUrlMapper {
    fn map(&self, url: &str) -> String {
        url.to_string()
    }
}
