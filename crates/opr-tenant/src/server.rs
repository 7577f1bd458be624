//! Builds the axum application that serves every tenant in a
//! [`TenantRegistry`]. A tenant's `urlRoot` names both its identity and
//! the path prefix it is nested under - two tenants sharing one listener
//! are only distinguishable because each was enrolled with a distinct
//! `urlRoot` path, the same uniqueness a tenant's `organizationURL`
//! already requires.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::TenantContext;
use crate::handlers::{
    handle_accept, handle_history, handle_jwks, handle_list, handle_org_config, handle_reject,
    handle_reserve,
};
use crate::registry::TenantRegistry;

fn tenant_router(tenant: Arc<TenantContext>) -> Router {
    let config = tenant.config.clone();
    Router::new()
        .route(&config.org_file_path, get(handle_org_config))
        .route(&config.jwks_path, get(handle_jwks))
        .route(&config.list_products_path, axum::routing::post(handle_list))
        .route(&config.accept_product_path, axum::routing::post(handle_accept))
        .route(&config.reject_product_path, axum::routing::post(handle_reject))
        .route(&config.reserve_product_path, axum::routing::post(handle_reserve))
        .route(&config.history_path, axum::routing::post(handle_history))
        .with_state(tenant)
}

/// The path component of a tenant's `urlRoot`, e.g. `/tenants/acme` for
/// `https://fed.example/tenants/acme`. Empty for a tenant mounted at the
/// root of its own listener.
fn tenant_prefix(config: &crate::config::TenantConfig) -> String {
    url::Url::parse(&config.url_root)
        .map(|u| u.path().trim_end_matches('/').to_string())
        .unwrap_or_default()
}

/// Merge every registered tenant's routes into one router, nested under
/// its `urlRoot` path prefix, with tracing and a request timeout applied
/// uniformly.
pub fn build_app(registry: &TenantRegistry) -> Router {
    let mut app = Router::new();
    for (_, tenant) in registry.iter() {
        let prefix = tenant_prefix(&tenant.config);
        let sub = tenant_router(tenant);
        app = if prefix.is_empty() { app.merge(sub) } else { app.nest(&prefix, sub) };
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
            .layer(CorsLayer::permissive()),
    )
}

/// Serve every tenant in `registry` on `listener` until the process is
/// asked to shut down.
pub async fn serve(registry: Arc<TenantRegistry>, listener: tokio::net::TcpListener) -> std::io::Result<()> {
    let app = build_app(&registry);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AllowAllAcl;
    use crate::config::TenantConfig;
    use async_trait::async_trait;
    use jsonwebtoken::jwk::JwkSet;
    use opr_chain::JwksResolver;
    use opr_core::clock::FixedClock;
    use opr_core::OprResult;
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

    fn tenant(url_root: &str) -> Arc<TenantContext> {
        let config = TenantConfig {
            host_org_url: format!("{url_root}/org.json"),
            url_root: url_root.to_string(),
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
            scopes_disabled: true,
            strict_correctness_mode: false,
        };
        let storage = Arc::new(InMemoryStorage::new());
        let policy = Arc::new(UniversalAcceptPolicy::new(vec![]));
        let clock = Arc::new(FixedClock::new(0));
        let model = OfferModel::new(config.host_org_url.clone(), storage, policy, None, clock.clone());
        Arc::new(TenantContext::new(config, model, None, Arc::new(NoJwks), Arc::new(AllowAllAcl), clock, None))
    }

    #[test]
    fn build_app_nests_tenants_under_distinct_url_root_prefixes() {
        let registry = TenantRegistry::new();
        registry.insert("https://fed.example/tenants/a/org.json", tenant("https://fed.example/tenants/a"));
        registry.insert("https://fed.example/tenants/b/org.json", tenant("https://fed.example/tenants/b"));
        let _ = build_app(&registry);
    }

    #[test]
    fn tenant_prefix_strips_scheme_and_host() {
        let config = TenantConfig {
            host_org_url: "https://fed.example/tenants/a/org.json".into(),
            url_root: "https://fed.example/tenants/a".into(),
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
            scopes_disabled: true,
            strict_correctness_mode: false,
        };
        assert_eq!(tenant_prefix(&config), "/tenants/a");
    }
}
