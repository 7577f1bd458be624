//! The offer model: ingesting producer updates, recomputing
//! per-viewer listings, and serving the five model operations a tenant
//! node exposes over HTTP.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use opr_chain::{
    compare_accept_preference, compare_reshare_preference, decode_chain, is_accept_qualified,
    is_reshare_qualified, sign_chain, SignChainOptions, TenantSigningKey,
};
use opr_core::error::codes;
use opr_core::reshare::{DecodedReshareChain, ReshareChain, Scope};
use opr_core::timeline::{Interval, TimelineEntry};
use opr_core::{Clock, Offer, OfferChange, OfferChangeType, OprResult, StatusError};
use opr_diff::OfferPatch;
use opr_policy::ListingPolicy;
use opr_storage::{
    ChainUse, CorpusDeleteResult, CorpusWriteResult, Isolation, Storage, StoredAcceptance,
    StoredRejection, Transaction,
};

use crate::events::{ChangeHandler, ChangeHandlerRegistry};
use crate::types::{
    AcceptResponse, HistoryPayload, HistoryResponse, ListOffersPayload, ListOffersResponse,
    ListResults, OfferHistoryEntry, PageToken, RejectResponse, ReserveResponse, ResponseFormat,
};

/// One update to the offers a producing org publishes.
pub enum OfferSetUpdate {
    /// A sequence of patches against the producer's own corpus.
    Delta(BoxStream<'static, OprResult<OfferPatch>>),
    /// A full replacement snapshot: every offer the producer currently
    /// publishes, in one pass.
    Snapshot(BoxStream<'static, OprResult<Offer>>),
}

/// The per-tenant offer model: the heart of a tenant node.
pub struct OfferModel {
    host_org_url: String,
    storage: Arc<dyn Storage>,
    listing_policy: Arc<dyn ListingPolicy>,
    signer: Option<TenantSigningKey>,
    clock: Arc<dyn Clock>,
    handlers: ChangeHandlerRegistry,
}

impl OfferModel {
    pub fn new(
        host_org_url: impl Into<String>,
        storage: Arc<dyn Storage>,
        listing_policy: Arc<dyn ListingPolicy>,
        signer: Option<TenantSigningKey>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            host_org_url: host_org_url.into(),
            storage,
            listing_policy,
            signer,
            clock,
            handlers: ChangeHandlerRegistry::new(),
        }
    }

    pub fn host_org_url(&self) -> &str {
        &self.host_org_url
    }

    pub async fn register_change_handler(&self, handler: ChangeHandler) -> usize {
        self.handlers.register(handler).await
    }

    async fn finish<T>(&self, t: Box<dyn Transaction>, result: OprResult<T>) -> OprResult<T> {
        match result {
            Ok(value) => {
                t.commit().await?;
                Ok(value)
            }
            Err(e) => {
                let _ = t.fail().await;
                Err(e)
            }
        }
    }

    async fn fire(&self, change_type: OfferChangeType, old_value: Option<Offer>, new_value: Option<Offer>) {
        self.handlers
            .dispatch(OfferChange {
                change_type,
                timestamp_utc: chrono::Utc::now(),
                old_value,
                new_value,
            })
            .await;
    }

    // ---- 4.6.1 processUpdate -------------------------------------------

    pub async fn process_update(&self, from_org_url: &str, update: OfferSetUpdate) -> OprResult<()> {
        let t = self.storage.create_transaction(Isolation::ReadWrite).await?;
        let result = match update {
            OfferSetUpdate::Delta(stream) => self.process_delta(t.as_ref(), from_org_url, stream).await,
            OfferSetUpdate::Snapshot(stream) => self.process_snapshot(t.as_ref(), from_org_url, stream).await,
        };
        self.finish(t, result).await
    }

    async fn process_delta(
        &self,
        t: &dyn Transaction,
        from_org_url: &str,
        mut stream: BoxStream<'static, OprResult<OfferPatch>>,
    ) -> OprResult<()> {
        while let Some(patch) = stream.next().await {
            self.apply_one_patch(t, from_org_url, &patch?).await?;
        }
        Ok(())
    }

    async fn apply_one_patch(&self, t: &dyn Transaction, from_org_url: &str, patch: &OfferPatch) -> OprResult<()> {
        let old_offer = match patch {
            OfferPatch::Clear => None,
            OfferPatch::Patch { target, .. } => {
                let id = target.unversioned();
                self.storage
                    .get_offer_from_corpus(t, &self.host_org_url, from_org_url, &id.id, &id.posting_org_url)
                    .await?
            }
        };

        let (outcome, new_offer) = opr_diff::apply_offer_patch(patch, old_offer.as_ref());
        let is_insert = outcome == opr_diff::PatchOutcome::Insert;

        match outcome {
            opr_diff::PatchOutcome::Clear => {
                let offers = self.storage.get_corpus_offers(t, &self.host_org_url, from_org_url).await?;
                for offer in offers {
                    self.delete_one(t, from_org_url, &offer.id, &offer.offered_by).await?;
                }
            }
            opr_diff::PatchOutcome::Delete => {
                let id = old_offer.as_ref().expect("a delete outcome always had an old offer");
                self.delete_one(t, from_org_url, &id.id, &id.offered_by).await?;
            }
            opr_diff::PatchOutcome::Insert | opr_diff::PatchOutcome::Update => {
                let offer = new_offer.expect("insert/update outcome always carries the new offer");
                self.upsert_one(t, from_org_url, old_offer, offer, is_insert).await?;
            }
            opr_diff::PatchOutcome::Noop => {}
            opr_diff::PatchOutcome::Error(message) => {
                tracing::warn!(from_org_url, message, "dropping unapplicable offer patch");
            }
        }
        Ok(())
    }

    async fn process_snapshot(
        &self,
        t: &dyn Transaction,
        from_org_url: &str,
        mut stream: BoxStream<'static, OprResult<Offer>>,
    ) -> OprResult<()> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        while let Some(offer) = stream.next().await {
            let offer = offer?;
            seen.insert((offer.offered_by.clone(), offer.id.clone()));
            let old_offer = self
                .storage
                .get_offer_from_corpus(t, &self.host_org_url, from_org_url, &offer.id, &offer.offered_by)
                .await?;
            let is_new = old_offer.is_none();
            self.upsert_one(t, from_org_url, old_offer, offer, is_new).await?;
        }

        let existing = self.storage.get_corpus_offers(t, &self.host_org_url, from_org_url).await?;
        for offer in existing {
            if !seen.contains(&(offer.offered_by.clone(), offer.id.clone())) {
                self.delete_one(t, from_org_url, &offer.id, &offer.offered_by).await?;
            }
        }
        Ok(())
    }

    async fn upsert_one(
        &self,
        t: &dyn Transaction,
        corpus: &str,
        old_offer: Option<Offer>,
        offer: Offer,
        is_insert: bool,
    ) -> OprResult<()> {
        let result = self
            .storage
            .insert_or_update_offer_in_corpus(t, &self.host_org_url, corpus, &offer)
            .await?;
        if result == CorpusWriteResult::None {
            return Ok(());
        }
        self.record_reshare_chain(t, &offer).await?;
        self.update_listings(t, &offer).await?;
        let change_type = if is_insert { OfferChangeType::Add } else { OfferChangeType::Update };
        self.fire(change_type, old_offer, Some(offer)).await;
        Ok(())
    }

    /// Decodes `offer`'s attached reshare chain, if any, and records it as
    /// the best known chain for the offer's `(id, posting_org)` whenever it
    /// beats (or there is no) existing stored chain for each use the chain
    /// qualifies for.
    async fn record_reshare_chain(&self, t: &dyn Transaction, offer: &Offer) -> OprResult<()> {
        let Some(chain) = offer.reshare_chain.as_ref() else {
            return Ok(());
        };
        if chain.0.is_empty() {
            return Ok(());
        }
        let decoded = decode_chain(chain)?;
        let id = offer.id.as_str();
        let posting_org = offer.offered_by.as_str();

        if is_accept_qualified(Some(&decoded)) {
            let existing = self
                .storage
                .get_best_accept_chain(t, &self.host_org_url, id, posting_org)
                .await?;
            let should_write = match &existing {
                None => true,
                Some(existing) => {
                    compare_accept_preference(Some(&decoded), Some(&existing.chain)) == std::cmp::Ordering::Less
                }
            };
            if should_write {
                self.storage
                    .set_best_chain(
                        t,
                        &self.host_org_url,
                        id,
                        posting_org,
                        ChainUse::Accept,
                        decoded.clone(),
                        chain.0.clone(),
                    )
                    .await?;
            }
        }

        if is_reshare_qualified(&decoded) {
            let existing = self
                .storage
                .get_best_reshare_chain_root(t, &self.host_org_url, id, posting_org)
                .await?;
            let should_write = match &existing {
                None => true,
                Some(existing) => {
                    compare_reshare_preference(&decoded, &existing.chain) == std::cmp::Ordering::Less
                }
            };
            if should_write {
                self.storage
                    .set_best_chain(
                        t,
                        &self.host_org_url,
                        id,
                        posting_org,
                        ChainUse::Reshare,
                        decoded,
                        chain.0.clone(),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete_one(&self, t: &dyn Transaction, corpus: &str, id: &str, posting_org: &str) -> OprResult<()> {
        let old = self.storage.get_offer(t, &self.host_org_url, id, posting_org).await?;
        let result = self
            .storage
            .delete_offer_in_corpus(t, &self.host_org_url, corpus, id, posting_org)
            .await?;
        if result == CorpusDeleteResult::Delete {
            self.delete_future_listings(t, id, posting_org).await?;
            self.fire(OfferChangeType::Delete, old, None).await;
        }
        Ok(())
    }

    // ---- 4.6.2 updateListings / 4.6.3 deleteFutureListings --------------

    async fn delete_future_listings(&self, t: &dyn Transaction, id: &str, posting_org: &str) -> OprResult<()> {
        let now = self.clock.now_millis();
        self.storage
            .truncate_future_timeline_for_offer(t, &self.host_org_url, id, posting_org, now)
            .await
    }

    async fn update_listings(&self, t: &dyn Transaction, offer: &Offer) -> OprResult<()> {
        let now = self.clock.now_millis();
        let id = offer.id.as_str();
        let posting_org = offer.offered_by.as_str();
        let host = self.host_org_url.as_str();

        let prior_entries = self
            .storage
            .get_timeline_for_offer(t, host, id, posting_org, None, None)
            .await?;
        let now_instant = Interval::new(now, now + 1);
        let current_reservation = prior_entries
            .iter()
            .find(|e| e.is_reservation && e.interval.intersects(&now_instant))
            .cloned();

        self.delete_future_listings(t, id, posting_org).await?;

        let mut new_entries = Vec::new();

        if posting_org != host {
            let best_accept = self.storage.get_best_accept_chain(t, host, id, posting_org).await?;
            new_entries.push(TimelineEntry {
                target_org_url: host.to_string(),
                offer_id: id.to_string(),
                posting_org_url: posting_org.to_string(),
                offer_update_utc: offer.update_timestamp(),
                interval: Interval::new(now, offer.expiration_or_max()),
                is_reservation: false,
                reshare_chain: best_accept.map(|c| ReshareChain(c.raw_jwts)),
            });
        }

        let chain_root_jwts: Option<Vec<String>> = if posting_org == host {
            Some(Vec::new())
        } else {
            self.storage
                .get_best_reshare_chain_root(t, host, id, posting_org)
                .await?
                .map(|c| c.raw_jwts)
        };

        if let Some(root_jwts) = chain_root_jwts {
            let rejections: HashSet<String> = self
                .storage
                .get_all_rejections(t, host, id, posting_org)
                .await?
                .into_iter()
                .map(|r| r.rejecting_org_url)
                .collect();

            let first_listing_time = prior_entries.iter().map(|e| e.interval.start_utc).min().unwrap_or(now);

            let mut listings = self
                .listing_policy
                .get_listings(offer, first_listing_time, now, &rejections, &HashSet::new())
                .await?;
            listings.retain(|l| !rejections.contains(&l.org_url));

            let reservation_window = current_reservation.as_ref().and_then(|reservation| {
                listings
                    .iter()
                    .find(|l| l.org_url == reservation.target_org_url && l.start_time_utc == now)
                    .and_then(|l| Interval::new(l.start_time_utc, l.end_time_utc).intersection(&reservation.interval))
                    .map(|window| (reservation.target_org_url.clone(), window))
            });

            for listing in &listings {
                let listing_interval = Interval::new(listing.start_time_utc, listing.end_time_utc);
                let scopes = if listing.scopes.is_empty() {
                    vec![Scope::Accept]
                } else {
                    listing.scopes.clone()
                };

                let sub_intervals = match &reservation_window {
                    Some((org, window)) if org == &listing.org_url => listing_interval.subtract(window),
                    _ => vec![listing_interval],
                };

                for sub in sub_intervals {
                    if sub.is_empty() {
                        continue;
                    }
                    new_entries.push(TimelineEntry {
                        target_org_url: listing.org_url.clone(),
                        offer_id: id.to_string(),
                        posting_org_url: posting_org.to_string(),
                        offer_update_utc: offer.update_timestamp(),
                        interval: sub,
                        is_reservation: false,
                        reshare_chain: self.extend_chain(&root_jwts, &listing.org_url, &scopes, id)?,
                    });
                }
            }

            if let Some((org, window)) = reservation_window {
                let scopes = listings
                    .iter()
                    .find(|l| l.org_url == org)
                    .map(|l| if l.scopes.is_empty() { vec![Scope::Accept] } else { l.scopes.clone() })
                    .unwrap_or_else(|| vec![Scope::Accept]);
                new_entries.push(TimelineEntry {
                    target_org_url: org.clone(),
                    offer_id: id.to_string(),
                    posting_org_url: posting_org.to_string(),
                    offer_update_utc: offer.update_timestamp(),
                    interval: window,
                    is_reservation: true,
                    reshare_chain: self.extend_chain(&root_jwts, &org, &scopes, id)?,
                });
            }
        }

        if !new_entries.is_empty() {
            self.storage.add_timeline_entries(t, host, new_entries).await?;
        }
        Ok(())
    }

    /// Extend `root_jwts` with a new link for `sub_org`. Returns `None`
    /// when no signer is configured - such entries only belong in a
    /// timeline where `offer.offeredBy == host`, since nothing downstream
    /// can trust an unsigned reshare chain.
    fn extend_chain(
        &self,
        root_jwts: &[String],
        sub_org: &str,
        scopes: &[Scope],
        offer_id: &str,
    ) -> OprResult<Option<ReshareChain>> {
        let Some(signer) = &self.signer else {
            return Ok(None);
        };
        let root = ReshareChain(root_jwts.to_vec());
        let options = SignChainOptions {
            initial_entitlement: root.is_empty().then(|| offer_id.to_string()),
            scopes: Some(scopes.iter().map(|s| s.as_str().to_string()).collect()),
        };
        let extended = sign_chain(&root, signer, &self.host_org_url, sub_org, options)?;
        Ok(Some(extended))
    }

    // ---- 4.6.4 list -------------------------------------------------

    pub async fn list(&self, org_url: &str, payload: ListOffersPayload) -> OprResult<ListOffersResponse> {
        let now = self.clock.now_millis();
        let t = self.storage.create_transaction(Isolation::ReadOnly).await?;
        let result = self.list_in_txn(t.as_ref(), org_url, payload, now).await;
        self.finish(t, result).await
    }

    async fn list_in_txn(
        &self,
        t: &dyn Transaction,
        org_url: &str,
        payload: ListOffersPayload,
        now: i64,
    ) -> OprResult<ListOffersResponse> {
        let token = payload.page_token.as_ref();
        let page_size = token.map(|p| p.max_results_per_page).unwrap_or(payload.max_results_per_page.max(1));
        let skip = token.map(|p| p.skip_count).unwrap_or(0);
        let format = token
            .and_then(|p| p.result_format)
            .or(payload.requested_result_format)
            .unwrap_or(ResponseFormat::Snapshot);

        match format {
            ResponseFormat::Snapshot => {
                let request_time = token.and_then(|p| p.request_time_utc).unwrap_or(now);
                let mut offers = self
                    .storage
                    .get_offers_at_time(t, &self.host_org_url, org_url, request_time, Some(skip))
                    .await?;
                let has_more = offers.len() > page_size;
                offers.truncate(page_size);
                Ok(ListOffersResponse {
                    response_format: ResponseFormat::Snapshot,
                    results_timestamp_utc: request_time,
                    offers: ListResults::Snapshot(offers),
                    next_page_token: has_more.then(|| PageToken {
                        max_results_per_page: page_size,
                        skip_count: skip + page_size,
                        request_time_utc: Some(request_time),
                        history_since_utc: None,
                        result_format: Some(ResponseFormat::Snapshot),
                    }),
                })
            }
            ResponseFormat::Diff => {
                let diff_start = token
                    .and_then(|p| p.history_since_utc)
                    .or(payload.diff_start_timestamp_utc)
                    .ok_or_else(|| {
                        StatusError::bad_request(codes::INVALID_REQUEST, "diff list requires diffStartTimestampUTC")
                    })?;

                let mut changes = self
                    .storage
                    .get_changed_offers(t, &self.host_org_url, org_url, diff_start, now, Some(skip))
                    .await?;
                let has_more = changes.len() > page_size;
                changes.truncate(page_size);

                let mut patches = Vec::with_capacity(changes.len() + 1);
                if skip == 0 {
                    let existed_at_start = self
                        .storage
                        .get_offers_at_time(t, &self.host_org_url, org_url, diff_start, None)
                        .await?;
                    if existed_at_start.is_empty() {
                        patches.push(OfferPatch::Clear);
                    }
                }
                for change in changes {
                    patches.push(change_to_patch(change));
                }

                Ok(ListOffersResponse {
                    response_format: ResponseFormat::Diff,
                    results_timestamp_utc: now,
                    offers: ListResults::Diff(patches),
                    next_page_token: has_more.then(|| PageToken {
                        max_results_per_page: page_size,
                        skip_count: skip + page_size,
                        request_time_utc: None,
                        history_since_utc: Some(diff_start),
                        result_format: Some(ResponseFormat::Diff),
                    }),
                })
            }
        }
    }

    // ---- 4.6.5 accept / reject / reserve --------------------------------

    pub async fn accept(
        &self,
        offer_id: &str,
        org_url: &str,
        if_not_newer_than: Option<i64>,
        decoded_chain: Option<DecodedReshareChain>,
    ) -> OprResult<AcceptResponse> {
        let t = self.storage.create_transaction(Isolation::ReadWrite).await?;
        let result = self.accept_in_txn(t.as_ref(), offer_id, org_url, if_not_newer_than, decoded_chain).await;
        self.finish(t, result).await
    }

    async fn accept_in_txn(
        &self,
        t: &dyn Transaction,
        offer_id: &str,
        org_url: &str,
        if_not_newer_than: Option<i64>,
        decoded_chain: Option<DecodedReshareChain>,
    ) -> OprResult<AcceptResponse> {
        let now = self.clock.now_millis();
        let offer = self
            .resolve_visible_offer(t, org_url, offer_id, now)
            .await?
            .ok_or_else(|| StatusError::bad_request(codes::ACCEPT_ERROR_NO_AVAILABLE_OFFER, "offer is not available to this org"))?;

        if let Some(threshold) = if_not_newer_than {
            if offer.update_timestamp() > threshold {
                return Err(StatusError::bad_request(
                    codes::ACCEPT_ERROR_OFFER_HAS_CHANGED,
                    "offer has changed since the caller last saw it",
                )
                .with_extra("offer", serde_json::to_value(&offer).expect("Offer always serializes")));
            }
        }

        let mut viewers = vec![self.host_org_url.clone(), org_url.to_string()];
        if let Some(chain) = &decoded_chain {
            for issuer in chain.issuers() {
                if !viewers.contains(&issuer) {
                    viewers.push(issuer);
                }
            }
        }

        self.storage
            .write_accept(
                t,
                &self.host_org_url,
                StoredAcceptance {
                    offer_id: offer.id.clone(),
                    posting_org_url: offer.offered_by.clone(),
                    last_update_utc: offer.update_timestamp(),
                    accepted_by: org_url.to_string(),
                    accepted_at_utc: now,
                    decoded_reshare_chain: decoded_chain,
                    viewers,
                },
            )
            .await?;

        self.storage
            .truncate_future_timeline_for_offer(t, &self.host_org_url, &offer.id, &offer.offered_by, now)
            .await?;

        self.fire(OfferChangeType::RemoteAccept, Some(offer.clone()), Some(offer.clone())).await;
        Ok(AcceptResponse { offer })
    }

    pub async fn reject(
        &self,
        rejecting_org_url: &str,
        offer_id: &str,
        posting_org_url: Option<&str>,
    ) -> OprResult<RejectResponse> {
        let t = self.storage.create_transaction(Isolation::ReadWrite).await?;
        let result = self.reject_in_txn(t.as_ref(), rejecting_org_url, offer_id, posting_org_url).await;
        self.finish(t, result).await
    }

    async fn reject_in_txn(
        &self,
        t: &dyn Transaction,
        rejecting_org_url: &str,
        offer_id: &str,
        posting_org_url: Option<&str>,
    ) -> OprResult<RejectResponse> {
        let now = self.clock.now_millis();
        let offer = match posting_org_url {
            Some(posting_org) => {
                self.storage
                    .get_offer_at_time(t, &self.host_org_url, rejecting_org_url, offer_id, posting_org, now)
                    .await?
            }
            None => self.resolve_visible_offer(t, rejecting_org_url, offer_id, now).await?,
        }
        .ok_or_else(|| StatusError::bad_request(codes::REJECT_ERROR_NO_AVAILABLE_OFFER, "offer is not available to this org"))?;

        self.storage
            .write_reject(
                t,
                &self.host_org_url,
                StoredRejection {
                    rejecting_org_url: rejecting_org_url.to_string(),
                    offer_id: offer.id.clone(),
                    posting_org_url: offer.offered_by.clone(),
                    rejected_at_utc: now,
                },
            )
            .await?;

        self.update_listings(t, &offer).await?;
        self.fire(OfferChangeType::RemoteReject, Some(offer.clone()), Some(offer.clone())).await;
        Ok(RejectResponse { offer })
    }

    pub async fn reserve(&self, offer_id: &str, requested_secs: i64, org_url: &str) -> OprResult<ReserveResponse> {
        let t = self.storage.create_transaction(Isolation::ReadWrite).await?;
        let result = self.reserve_in_txn(t.as_ref(), offer_id, requested_secs, org_url).await;
        self.finish(t, result).await
    }

    async fn reserve_in_txn(
        &self,
        t: &dyn Transaction,
        offer_id: &str,
        requested_secs: i64,
        org_url: &str,
    ) -> OprResult<ReserveResponse> {
        let now = self.clock.now_millis();
        let offer = self
            .resolve_visible_offer(t, org_url, offer_id, now)
            .await?
            .ok_or_else(|| StatusError::bad_request(codes::RESERVE_ERROR_NO_AVAILABLE_OFFER, "offer is not available to this org"))?;

        let max_secs = offer.max_reservation_time_secs.unwrap_or(requested_secs).min(requested_secs);
        let end = now + max_secs.max(0) * 1000;

        self.storage
            .truncate_future_timeline_for_offer(t, &self.host_org_url, &offer.id, &offer.offered_by, now)
            .await?;
        self.storage
            .add_timeline_entries(
                t,
                &self.host_org_url,
                vec![TimelineEntry {
                    target_org_url: org_url.to_string(),
                    offer_id: offer.id.clone(),
                    posting_org_url: offer.offered_by.clone(),
                    offer_update_utc: offer.update_timestamp(),
                    interval: Interval::new(now, end),
                    is_reservation: true,
                    reshare_chain: offer.reshare_chain.clone(),
                }],
            )
            .await?;

        self.update_listings(t, &offer).await?;
        self.fire(OfferChangeType::RemoteReserve, Some(offer.clone()), Some(offer.clone())).await;
        Ok(ReserveResponse { offer, reservation_expiration_utc: end })
    }

    async fn resolve_visible_offer(
        &self,
        t: &dyn Transaction,
        viewer: &str,
        offer_id: &str,
        at_time: i64,
    ) -> OprResult<Option<Offer>> {
        let offers = self.storage.get_offers_at_time(t, &self.host_org_url, viewer, at_time, None).await?;
        Ok(offers.into_iter().find(|o| o.id == offer_id))
    }

    // ---- 4.6.6 history ---------------------------------------------------

    pub async fn get_history(&self, org_url: &str, payload: HistoryPayload) -> OprResult<HistoryResponse> {
        let t = self.storage.create_transaction(Isolation::ReadOnly).await?;
        let result = self.get_history_in_txn(t.as_ref(), org_url, payload).await;
        self.finish(t, result).await
    }

    async fn get_history_in_txn(
        &self,
        t: &dyn Transaction,
        org_url: &str,
        payload: HistoryPayload,
    ) -> OprResult<HistoryResponse> {
        let token = payload.page_token.as_ref();
        let page_size = token.map(|p| p.max_results_per_page).unwrap_or(payload.max_results_per_page.max(1));
        let skip = token.map(|p| p.skip_count).unwrap_or(0);

        let mut entries = self.storage.get_history(t, &self.host_org_url, org_url, Some(skip)).await?;
        let has_more = entries.len() > page_size;
        entries.truncate(page_size);

        let offer_histories = entries
            .into_iter()
            .map(|a| OfferHistoryEntry {
                offer_id: a.offer_id,
                posting_org_url: a.posting_org_url,
                last_update_utc: a.last_update_utc,
                accepted_by: a.accepted_by,
                accepted_at_utc: a.accepted_at_utc,
            })
            .collect();

        Ok(HistoryResponse {
            offer_histories,
            next_page_token: has_more.then(|| PageToken {
                max_results_per_page: page_size,
                skip_count: skip + page_size,
                request_time_utc: None,
                history_since_utc: payload.history_since_utc,
                result_format: None,
            }),
        })
    }
}

fn change_to_patch(change: OfferChange) -> OfferPatch {
    use opr_core::ids::{StructuredOfferId, VersionedOrPlainId, VersionedStructuredOfferId};

    let (target, old_json, new_json) = match (&change.old_value, &change.new_value) {
        (Some(old), Some(new)) => (
            VersionedOrPlainId::Versioned(VersionedStructuredOfferId::new(
                new.offered_by.clone(),
                new.id.clone(),
                new.update_timestamp(),
            )),
            serde_json::to_value(old).expect("Offer always serializes"),
            serde_json::to_value(new).expect("Offer always serializes"),
        ),
        (None, Some(new)) => (
            VersionedOrPlainId::Plain(StructuredOfferId::new(new.offered_by.clone(), new.id.clone())),
            serde_json::Value::Null,
            serde_json::to_value(new).expect("Offer always serializes"),
        ),
        (Some(old), None) => (
            VersionedOrPlainId::Versioned(VersionedStructuredOfferId::new(
                old.offered_by.clone(),
                old.id.clone(),
                old.update_timestamp(),
            )),
            serde_json::to_value(old).expect("Offer always serializes"),
            serde_json::Value::Null,
        ),
        (None, None) => unreachable!("a change always carries at least one side"),
    };

    OfferPatch::Patch { target, patch: json_patch::diff(&old_json, &new_json) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opr_core::ids::StructuredOfferId;
    use opr_core::FixedClock;
    use opr_policy::UniversalAcceptPolicy;
    use opr_storage::InMemoryStorage;

    const HOST: &str = "https://host.example/org.json";
    const PEER: &str = "https://peer.example/org.json";

    fn offer(id: &str, posting_org: &str, creation: i64) -> Offer {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "offeredBy": posting_org,
            "offerCreationUTC": creation,
        }))
        .unwrap()
    }

    fn model(clock: FixedClock) -> OfferModel {
        OfferModel::new(
            HOST,
            Arc::new(InMemoryStorage::new()),
            Arc::new(UniversalAcceptPolicy::new(vec![PEER.to_string()])),
            None,
            Arc::new(clock),
        )
    }

    fn offer_stream(offers: Vec<Offer>) -> BoxStream<'static, OprResult<Offer>> {
        futures::stream::iter(offers.into_iter().map(Ok)).boxed()
    }

    #[tokio::test]
    async fn snapshot_ingest_then_list_sees_the_offer() {
        let model = model(FixedClock::new(1_000));
        model
            .process_update(HOST, OfferSetUpdate::Snapshot(offer_stream(vec![offer("o1", HOST, 1_000)])))
            .await
            .unwrap();

        let response = model.list(PEER, ListOffersPayload::default()).await.unwrap();
        match response.offers {
            ListResults::Snapshot(offers) => assert_eq!(offers.len(), 1),
            ListResults::Diff(_) => panic!("expected a snapshot response"),
        }
    }

    #[tokio::test]
    async fn second_snapshot_without_the_offer_deletes_it() {
        let model = model(FixedClock::new(1_000));
        model
            .process_update(HOST, OfferSetUpdate::Snapshot(offer_stream(vec![offer("o1", HOST, 1_000)])))
            .await
            .unwrap();
        model.process_update(HOST, OfferSetUpdate::Snapshot(offer_stream(vec![]))).await.unwrap();

        let response = model.list(PEER, ListOffersPayload::default()).await.unwrap();
        match response.offers {
            ListResults::Snapshot(offers) => assert!(offers.is_empty()),
            ListResults::Diff(_) => panic!("expected a snapshot response"),
        }
    }

    #[tokio::test]
    async fn accept_on_unlisted_offer_fails() {
        let model = model(FixedClock::new(1_000));
        let err = model.accept("missing", PEER, None, None).await.unwrap_err();
        assert_eq!(err.code, codes::ACCEPT_ERROR_NO_AVAILABLE_OFFER);
    }

    #[tokio::test]
    async fn accept_then_list_no_longer_shows_the_offer() {
        let model = model(FixedClock::new(1_000));
        model
            .process_update(HOST, OfferSetUpdate::Snapshot(offer_stream(vec![offer("o1", HOST, 1_000)])))
            .await
            .unwrap();

        model.accept("o1", PEER, None, None).await.unwrap();

        let response = model.list(PEER, ListOffersPayload::default()).await.unwrap();
        match response.offers {
            ListResults::Snapshot(offers) => assert!(offers.is_empty()),
            ListResults::Diff(_) => panic!("expected a snapshot response"),
        }
    }

    #[test]
    fn change_to_patch_on_a_new_offer_targets_a_plain_id() {
        let new = offer("o1", HOST, 1_000);
        let patch = change_to_patch(OfferChange {
            change_type: OfferChangeType::Add,
            timestamp_utc: chrono::Utc::now(),
            old_value: None,
            new_value: Some(new),
        });
        match patch {
            OfferPatch::Patch { target, .. } => {
                assert_eq!(target.unversioned(), StructuredOfferId::new(HOST, "o1"));
            }
            OfferPatch::Clear => panic!("expected a targeted patch"),
        }
    }

    fn accept_key() -> opr_chain::TenantSigningKey {
        opr_chain::TenantSigningKey::from_hmac_secret(
            jsonwebtoken::Algorithm::HS256,
            b"peer-secret",
            Some("peer-key".to_string()),
        )
    }

    #[tokio::test]
    async fn ingesting_a_peer_offer_with_a_chain_records_it_as_the_best_accept_chain() {
        let model = model(FixedClock::new(1_000));
        let chain = sign_chain(
            &ReshareChain::empty(),
            &accept_key(),
            PEER,
            HOST,
            SignChainOptions {
                initial_entitlement: Some("entitlement-1".into()),
                scopes: Some(vec!["ACCEPT".into()]),
            },
        )
        .unwrap();

        let mut peer_offer = offer("o1", PEER, 1_000);
        peer_offer.reshare_chain = Some(chain.clone());
        model
            .process_update(PEER, OfferSetUpdate::Snapshot(offer_stream(vec![peer_offer])))
            .await
            .unwrap();

        let t = model.storage.create_transaction(Isolation::ReadWrite).await.unwrap();
        let best = model
            .storage
            .get_best_accept_chain(t.as_ref(), HOST, "o1", PEER)
            .await
            .unwrap()
            .expect("a chain should have been recorded");
        assert_eq!(best.raw_jwts, chain.0);
    }
}
