//! The feed producer: pulls offers from a peer
//! tenant's `listProductsPath` over an authenticated HTTP client, paging
//! through the response and enforcing that every page keeps the same
//! SNAPSHOT/DIFF shape as the first.

use std::sync::Arc;

use async_stream::stream;
use futures::stream::{BoxStream, StreamExt};

use opr_chain::{issue_token, IssueOptions, TenantSigningKey};
use opr_core::error::codes;
use opr_core::{Clock, Offer, OprResult, StatusError};
use opr_diff::OfferPatch;
use opr_model::{ListOffersPayload, ListOffersResponse, ListResults, OfferSetUpdate, ResponseFormat};
use opr_orgconfig::OrgConfigResolver;

use crate::producer::{OfferProducer, ProducedUpdate};

const DEFAULT_PAGE_SIZE: usize = 100;

pub struct FeedProducer {
    id: String,
    host_org_url: String,
    peer_org_url: String,
    signer: TenantSigningKey,
    http: reqwest::Client,
    resolver: Arc<OrgConfigResolver>,
    poll_frequency_millis: i64,
    clock: Arc<dyn Clock>,
}

impl FeedProducer {
    pub fn new(
        id: impl Into<String>,
        host_org_url: impl Into<String>,
        peer_org_url: impl Into<String>,
        signer: TenantSigningKey,
        http: reqwest::Client,
        resolver: Arc<OrgConfigResolver>,
        poll_frequency_millis: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: id.into(),
            host_org_url: host_org_url.into(),
            peer_org_url: peer_org_url.into(),
            signer,
            http,
            resolver,
            poll_frequency_millis,
            clock,
        }
    }

    async fn list_endpoint(&self) -> OprResult<String> {
        let config = self.resolver.get(&self.peer_org_url).await?;
        config.list_products_endpoint_url.clone().ok_or_else(|| {
            StatusError::internal(
                codes::AUTH_ERROR,
                format!("org '{}' publishes no list endpoint", self.peer_org_url),
            )
        })
    }

    fn fetch_state(&self) -> FetchState {
        FetchState {
            http: self.http.clone(),
            signer: self.signer.clone(),
            host_org_url: self.host_org_url.clone(),
            peer_org_url: self.peer_org_url.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[async_trait::async_trait]
impl OfferProducer for FeedProducer {
    fn producer_id(&self) -> &str {
        &self.id
    }

    fn source_org_url(&self) -> &str {
        &self.peer_org_url
    }

    async fn produce_offers(&self, mut payload: ListOffersPayload) -> OprResult<ProducedUpdate> {
        if payload.max_results_per_page == 0 {
            payload.max_results_per_page = DEFAULT_PAGE_SIZE;
        }

        let endpoint = self.list_endpoint().await?;
        let state = self.fetch_state();
        let first = state.fetch(&endpoint, payload).await?;
        let format = first.response_format;
        let earliest_next_request_utc = self.clock.now_millis() + self.poll_frequency_millis;

        let update = match format {
            ResponseFormat::Snapshot => OfferSetUpdate::Snapshot(snapshot_pages(state, endpoint, first)),
            ResponseFormat::Diff => OfferSetUpdate::Delta(diff_pages(state, endpoint, first)),
        };

        Ok(ProducedUpdate {
            update,
            earliest_next_request_utc,
        })
    }
}

/// The pieces of a [`FeedProducer`] a paging stream needs to own once it
/// outlives the `produce_offers` call that started it.
#[derive(Clone)]
struct FetchState {
    http: reqwest::Client,
    signer: TenantSigningKey,
    host_org_url: String,
    peer_org_url: String,
    clock: Arc<dyn Clock>,
}

impl FetchState {
    async fn fetch(&self, endpoint: &str, payload: ListOffersPayload) -> OprResult<ListOffersResponse> {
        let now = self.clock.now_millis();
        let token = issue_token(
            &self.signer,
            &self.host_org_url,
            &self.peer_org_url,
            IssueOptions {
                sub: Some(self.host_org_url.clone()),
                scopes: Some(vec!["LISTPRODUCTS".to_string()]),
                max_age_millis: None,
            },
            now,
        )?;

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                StatusError::internal(codes::AUTH_ERROR, format!("list request to '{endpoint}' failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(StatusError::internal(
                codes::AUTH_ERROR,
                format!("list endpoint '{endpoint}' returned status {}", response.status()),
            ));
        }

        response.json().await.map_err(|e| {
            StatusError::internal(
                codes::INTERNAL_ERROR_MALFORMED_RESPONSE,
                format!("invalid list response JSON: {e}"),
            )
        })
    }
}

fn snapshot_pages(
    state: FetchState,
    endpoint: String,
    first: ListOffersResponse,
) -> BoxStream<'static, OprResult<Offer>> {
    stream! {
        let mut page = Some(first);
        while let Some(response) = page.take() {
            let next_page_token = response.next_page_token;
            let offers = match response.offers {
                ListResults::Snapshot(offers) => offers,
                ListResults::Diff(_) => {
                    yield Err(StatusError::internal(
                        codes::PRODUCER_ILLEGAL_RESPONSE_PAGES_INCONSISTENT,
                        "feed producer's pages mixed SNAPSHOT and DIFF format",
                    ));
                    return;
                }
            };
            for offer in offers {
                yield Ok(offer);
            }

            let Some(page_token) = next_page_token else {
                break;
            };
            let next_payload = ListOffersPayload {
                page_token: Some(page_token),
                ..Default::default()
            };
            match state.fetch(&endpoint, next_payload).await {
                Ok(next) if next.response_format != ResponseFormat::Snapshot => {
                    yield Err(StatusError::internal(
                        codes::PRODUCER_ILLEGAL_RESPONSE_PAGES_INCONSISTENT,
                        "feed producer's pages mixed SNAPSHOT and DIFF format",
                    ));
                    return;
                }
                Ok(next) => page = Some(next),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
    .boxed()
}

fn diff_pages(
    state: FetchState,
    endpoint: String,
    first: ListOffersResponse,
) -> BoxStream<'static, OprResult<OfferPatch>> {
    stream! {
        let mut page = Some(first);
        while let Some(response) = page.take() {
            let next_page_token = response.next_page_token;
            let patches = match response.offers {
                ListResults::Diff(patches) => patches,
                ListResults::Snapshot(_) => {
                    yield Err(StatusError::internal(
                        codes::PRODUCER_ILLEGAL_RESPONSE_PAGES_INCONSISTENT,
                        "feed producer's pages mixed SNAPSHOT and DIFF format",
                    ));
                    return;
                }
            };
            for patch in patches {
                yield Ok(patch);
            }

            let Some(page_token) = next_page_token else {
                break;
            };
            let next_payload = ListOffersPayload {
                page_token: Some(page_token),
                ..Default::default()
            };
            match state.fetch(&endpoint, next_payload).await {
                Ok(next) if next.response_format != ResponseFormat::Diff => {
                    yield Err(StatusError::internal(
                        codes::PRODUCER_ILLEGAL_RESPONSE_PAGES_INCONSISTENT,
                        "feed producer's pages mixed SNAPSHOT and DIFF format",
                    ));
                    return;
                }
                Ok(next) => page = Some(next),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
    .boxed()
}
