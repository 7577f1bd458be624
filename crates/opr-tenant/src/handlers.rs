//! The five federated HTTP handlers, plus the org-config and local-JWKS
//! endpoints, each running the authenticated request flow before
//! delegating to [`opr_model::OfferModel`].

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use opr_model::{
    AcceptPayload, AcceptResponse, HistoryPayload, HistoryResponse, ListOffersPayload,
    ListOffersResponse, RejectPayload, RejectResponse, ReservePayload, ReserveResponse,
};
use opr_orgconfig::OrgConfig;

use crate::context::TenantContext;
use crate::error::TenantError;
use crate::middleware::{authenticate, authorize_with_optional_chain, require_acl, require_scope};
use crate::schema::{validate_response, ResponseKind};

type TenantState = State<Arc<TenantContext>>;

/// In strict-correctness mode, validate the outgoing response against
/// its schema before returning it. A validation failure here
/// means this tenant node produced a malformed response, which is a bug
/// in this node rather than in the caller's request.
fn finish_response<T: serde::Serialize>(
    tenant: &TenantContext,
    kind: ResponseKind,
    value: T,
) -> Result<Json<T>, TenantError> {
    if tenant.config.strict_correctness_mode {
        validate_response(kind, &value)?;
    }
    Ok(Json(value))
}

pub async fn handle_org_config(State(tenant): TenantState) -> Json<OrgConfig> {
    Json(tenant.org_config())
}

pub async fn handle_jwks(State(tenant): TenantState) -> Result<Json<jsonwebtoken::jwk::JwkSet>, TenantError> {
    match &tenant.local_jwks {
        Some(jwks) => Ok(Json(jwks.clone())),
        None => Err(TenantError(opr_core::StatusError::not_implemented(
            "NO_KEYSET_SPECIFIED",
            "this tenant does not serve a local keyset",
        ))),
    }
}

pub async fn handle_list(
    State(tenant): TenantState,
    headers: HeaderMap,
    Json(payload): Json<ListOffersPayload>,
) -> Result<Json<ListOffersResponse>, TenantError> {
    let auth = authenticate(&headers, tenant.jwks_resolver.as_ref(), &tenant.config.host_org_url).await?;
    require_scope(&auth, "LISTPRODUCTS", tenant.config.scopes_disabled)?;
    require_acl(tenant.acl.as_ref(), &auth.issuer).await?;

    let response = tenant.model.list(&auth.issuer, payload).await?;
    finish_response(&tenant, ResponseKind::ListOffers, response)
}

pub async fn handle_accept(
    State(tenant): TenantState,
    headers: HeaderMap,
    Json(payload): Json<AcceptPayload>,
) -> Result<Json<AcceptResponse>, TenantError> {
    let auth = authenticate(&headers, tenant.jwks_resolver.as_ref(), &tenant.config.host_org_url).await?;
    require_scope(&auth, "ACCEPTPRODUCT", tenant.config.scopes_disabled)?;

    let decoded_chain = authorize_with_optional_chain(
        tenant.acl.as_ref(),
        tenant.jwks_resolver.as_ref(),
        &tenant.config.host_org_url,
        &auth.issuer,
        &payload.offer_id,
        payload.reshare_chain.as_ref(),
    )
    .await?;

    let response = tenant
        .model
        .accept(&payload.offer_id, &auth.issuer, payload.if_not_newer_than_timestamp_utc, decoded_chain)
        .await?;
    finish_response(&tenant, ResponseKind::Accept, response)
}

pub async fn handle_reject(
    State(tenant): TenantState,
    headers: HeaderMap,
    Json(payload): Json<RejectPayload>,
) -> Result<Json<RejectResponse>, TenantError> {
    let auth = authenticate(&headers, tenant.jwks_resolver.as_ref(), &tenant.config.host_org_url).await?;
    require_scope(&auth, "ACCEPTPRODUCT", tenant.config.scopes_disabled)?;
    require_acl(tenant.acl.as_ref(), &auth.issuer).await?;

    let response = tenant.model.reject(&auth.issuer, &payload.offer_id, payload.offered_by_url.as_deref()).await?;
    finish_response(&tenant, ResponseKind::Reject, response)
}

pub async fn handle_reserve(
    State(tenant): TenantState,
    headers: HeaderMap,
    Json(payload): Json<ReservePayload>,
) -> Result<Json<ReserveResponse>, TenantError> {
    let auth = authenticate(&headers, tenant.jwks_resolver.as_ref(), &tenant.config.host_org_url).await?;
    require_scope(&auth, "ACCEPTPRODUCT", tenant.config.scopes_disabled)?;

    // The verified chain authorizes this reservation the same way it does
    // an accept; the model's reservation window is driven by
    // `requestedReservationSecs` alone, so the decoded chain is not
    // threaded any further once authorization succeeds.
    let _decoded_chain = authorize_with_optional_chain(
        tenant.acl.as_ref(),
        tenant.jwks_resolver.as_ref(),
        &tenant.config.host_org_url,
        &auth.issuer,
        &payload.offer_id,
        payload.reshare_chain.as_ref(),
    )
    .await?;

    let requested_secs = payload.requested_reservation_secs.unwrap_or(i64::MAX);
    let response = tenant.model.reserve(&payload.offer_id, requested_secs, &auth.issuer).await?;
    finish_response(&tenant, ResponseKind::Reserve, response)
}

pub async fn handle_history(
    State(tenant): TenantState,
    headers: HeaderMap,
    Json(payload): Json<HistoryPayload>,
) -> Result<Json<HistoryResponse>, TenantError> {
    // History carries no ACL gate of its own: any org that can
    // authenticate against this tenant may read the acceptance history of
    // offers it could see.
    let auth = authenticate(&headers, tenant.jwks_resolver.as_ref(), &tenant.config.host_org_url).await?;
    require_scope(&auth, "PRODUCTHISTORY", tenant.config.scopes_disabled)?;

    let response = tenant.model.get_history(&auth.issuer, payload).await?;
    finish_response(&tenant, ResponseKind::History, response)
}
