//! An in-memory [`Storage`] backed by a single coarse lock - correct, not
//! fast. Grounded on the `Arc<RwLock<HashMap<...>>>` pattern used for
//! task storage in the host crate this workspace descends from: every
//! table lives behind one guard, and a transaction is just a marker that
//! additionally takes an exclusive write permit for the lifetime of a
//! READWRITE transaction, modeling the serializable isolation level with
//! a single global writer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use opr_core::reshare::DecodedReshareChain;
use opr_core::timeline::{Interval, TimelineEntry};
use opr_core::{Offer, OfferChange, OfferChangeType, OprResult, StatusError};

use crate::store::Storage;
use crate::transaction::Transaction;
use crate::types::{
    ChainUse, CorpusDeleteResult, CorpusWriteResult, Isolation, ProducerMetadata,
    StoredAcceptance, StoredRejection, StoredReshareChain,
};

#[derive(Default)]
struct HostState {
    /// `(postingOrgUrl, id, lastUpdateUTC) -> offer JSON`.
    snapshots: HashMap<(String, String, i64), Value>,
    /// `(corpus, postingOrgUrl, id) -> lastUpdateUTC`.
    corpus_offers: HashMap<(String, String, String), i64>,
    timeline: Vec<TimelineEntry>,
    rejections: Vec<StoredRejection>,
    acceptances: Vec<StoredAcceptance>,
    /// `(id, postingOrgUrl, forUse) -> best chain`.
    best_chains: HashMap<(String, String, ChainUse), StoredReshareChain>,
    producer_metadata: HashMap<String, ProducerMetadata>,
    kv: HashMap<String, Value>,
}

#[derive(Default)]
struct Inner {
    hosts: HashMap<String, HostState>,
}

/// An in-memory implementation of the storage interface, suitable for
/// tests and single-process deployments.
pub struct InMemoryStorage {
    data: Arc<RwLock<Inner>>,
    writer_permit: Arc<RwLock<()>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Inner::default())),
            writer_permit: Arc::new(RwLock::new(())),
        }
    }
}

struct InMemoryTransaction {
    isolation: Isolation,
    _write_guard: Option<OwnedRwLockWriteGuard<()>>,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    fn isolation(&self) -> Isolation {
        self.isolation
    }

    async fn commit(self: Box<Self>) -> OprResult<()> {
        Ok(())
    }

    async fn fail(self: Box<Self>) -> OprResult<()> {
        Ok(())
    }
}

fn offer_from_json(value: &Value) -> OprResult<Offer> {
    serde_json::from_value(value.clone())
        .map_err(|e| StatusError::internal("INTERNAL_ERROR_MALFORMED_RESPONSE", e.to_string()))
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_transaction(&self, isolation: Isolation) -> OprResult<Box<dyn Transaction>> {
        let write_guard = match isolation {
            Isolation::ReadWrite => Some(Arc::clone(&self.writer_permit).write_owned().await),
            Isolation::ReadOnly => None,
        };
        Ok(Box::new(InMemoryTransaction {
            isolation,
            _write_guard: write_guard,
        }))
    }

    async fn insert_or_update_offer_in_corpus(
        &self,
        _t: &dyn Transaction,
        host: &str,
        corpus: &str,
        offer: &Offer,
    ) -> OprResult<CorpusWriteResult> {
        let mut data = self.data.write().await;
        let state = data.hosts.entry(host.to_string()).or_default();
        let key = (corpus.to_string(), offer.offered_by.clone(), offer.id.clone());
        let new_ts = offer.update_timestamp();
        let offer_json = serde_json::to_value(offer).expect("Offer always serializes");

        let result = match state.corpus_offers.get(&key).copied() {
            Some(existing_ts) if existing_ts == new_ts => CorpusWriteResult::None,
            Some(_) => CorpusWriteResult::Update,
            None => CorpusWriteResult::Add,
        };

        if result != CorpusWriteResult::None {
            state.corpus_offers.insert(key, new_ts);
            state
                .snapshots
                .insert((offer.offered_by.clone(), offer.id.clone(), new_ts), offer_json);
        }
        Ok(result)
    }

    async fn delete_offer_in_corpus(
        &self,
        _t: &dyn Transaction,
        host: &str,
        corpus: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<CorpusDeleteResult> {
        let mut data = self.data.write().await;
        let Some(state) = data.hosts.get_mut(host) else {
            return Ok(CorpusDeleteResult::None);
        };
        let key = (corpus.to_string(), posting_org.to_string(), id.to_string());
        if state.corpus_offers.remove(&key).is_none() {
            return Ok(CorpusDeleteResult::None);
        }
        let still_published = state
            .corpus_offers
            .keys()
            .any(|(_, p, i)| p == posting_org && i == id);
        Ok(if still_published {
            CorpusDeleteResult::None
        } else {
            CorpusDeleteResult::Delete
        })
    }

    async fn get_offer(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<Offer>> {
        let data = self.data.read().await;
        let Some(state) = data.hosts.get(host) else {
            return Ok(None);
        };
        let latest = state
            .snapshots
            .iter()
            .filter(|((p, i, _), _)| p == posting_org && i == id)
            .max_by_key(|((_, _, ts), _)| *ts)
            .map(|(_, v)| v);
        latest.map(offer_from_json).transpose()
    }

    async fn get_offer_from_corpus(
        &self,
        _t: &dyn Transaction,
        host: &str,
        corpus: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<Offer>> {
        let data = self.data.read().await;
        let Some(state) = data.hosts.get(host) else {
            return Ok(None);
        };
        let key = (corpus.to_string(), posting_org.to_string(), id.to_string());
        let Some(ts) = state.corpus_offers.get(&key) else {
            return Ok(None);
        };
        let snap_key = (posting_org.to_string(), id.to_string(), *ts);
        state.snapshots.get(&snap_key).map(offer_from_json).transpose()
    }

    async fn get_offer_sources(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Vec<String>> {
        let data = self.data.read().await;
        let Some(state) = data.hosts.get(host) else {
            return Ok(Vec::new());
        };
        Ok(state
            .corpus_offers
            .keys()
            .filter(|(_, p, i)| p == posting_org && i == id)
            .map(|(corpus, _, _)| corpus.clone())
            .collect())
    }

    async fn get_corpus_offers(
        &self,
        _t: &dyn Transaction,
        host: &str,
        corpus: &str,
    ) -> OprResult<Vec<Offer>> {
        let data = self.data.read().await;
        let Some(state) = data.hosts.get(host) else {
            return Ok(Vec::new());
        };
        state
            .corpus_offers
            .iter()
            .filter(|((c, _, _), _)| c == corpus)
            .map(|((_, posting_org, id), ts)| {
                let snap_key = (posting_org.clone(), id.clone(), *ts);
                offer_from_json(state.snapshots.get(&snap_key).expect("corpus entry has a snapshot"))
            })
            .collect()
    }

    async fn get_timeline_for_offer(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
        interval: Option<Interval>,
        target_org: Option<&str>,
    ) -> OprResult<Vec<TimelineEntry>> {
        let data = self.data.read().await;
        let Some(state) = data.hosts.get(host) else {
            return Ok(Vec::new());
        };
        Ok(state
            .timeline
            .iter()
            .filter(|e| e.offer_id == id && e.posting_org_url == posting_org)
            .filter(|e| interval.map_or(true, |i| e.interval.intersects(&i)))
            .filter(|e| target_org.map_or(true, |o| e.target_org_url == o))
            .cloned()
            .collect())
    }

    async fn add_timeline_entries(
        &self,
        _t: &dyn Transaction,
        host: &str,
        entries: Vec<TimelineEntry>,
    ) -> OprResult<()> {
        let mut data = self.data.write().await;
        let state = data.hosts.entry(host.to_string()).or_default();
        state.timeline.extend(entries);
        Ok(())
    }

    async fn truncate_future_timeline_for_offer(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
        at_time: i64,
    ) -> OprResult<()> {
        let mut data = self.data.write().await;
        let Some(state) = data.hosts.get_mut(host) else {
            return Ok(());
        };
        state.timeline.retain_mut(|e| {
            if e.offer_id != id || e.posting_org_url != posting_org {
                return true;
            }
            if e.interval.start_utc >= at_time {
                return false;
            }
            if e.interval.contains(at_time) {
                e.interval.end_utc = at_time;
            }
            true
        });
        Ok(())
    }

    async fn get_offers_at_time(
        &self,
        _t: &dyn Transaction,
        host: &str,
        viewer: &str,
        at_time: i64,
        skip: Option<usize>,
    ) -> OprResult<Vec<Offer>> {
        let data = self.data.read().await;
        let Some(state) = data.hosts.get(host) else {
            return Ok(Vec::new());
        };

        let mut best: HashMap<(String, String), &TimelineEntry> = HashMap::new();
        for entry in &state.timeline {
            if !entry.matches_viewer(viewer, host) || !entry.interval.contains(at_time) {
                continue;
            }
            let key = (entry.posting_org_url.clone(), entry.offer_id.clone());
            match best.get(&key) {
                Some(current) if current.offer_update_utc >= entry.offer_update_utc => {}
                _ => {
                    best.insert(key, entry);
                }
            }
        }

        let mut keys: Vec<_> = best.keys().cloned().collect();
        keys.sort();

        keys.into_iter()
            .skip(skip.unwrap_or(0))
            .map(|key| {
                let entry = best[&key];
                let snap_key = (
                    entry.posting_org_url.clone(),
                    entry.offer_id.clone(),
                    entry.offer_update_utc,
                );
                offer_from_json(state.snapshots.get(&snap_key).ok_or_else(|| {
                    StatusError::internal(
                        "INTERNAL_ERROR_MALFORMED_RESPONSE",
                        "timeline entry refers to a missing snapshot",
                    )
                })?)
            })
            .collect()
    }

    async fn get_offer_at_time(
        &self,
        t: &dyn Transaction,
        host: &str,
        viewer: &str,
        id: &str,
        posting_org: &str,
        at_time: i64,
    ) -> OprResult<Option<Offer>> {
        let offers = self.get_offers_at_time(t, host, viewer, at_time, None).await?;
        Ok(offers
            .into_iter()
            .find(|o| o.id == id && o.offered_by == posting_org))
    }

    async fn get_changed_offers(
        &self,
        t: &dyn Transaction,
        host: &str,
        viewer: &str,
        old_t: i64,
        new_t: i64,
        skip: Option<usize>,
    ) -> OprResult<Vec<OfferChange>> {
        let old_offers = self.get_offers_at_time(t, host, viewer, old_t, None).await?;
        let new_offers = self.get_offers_at_time(t, host, viewer, new_t, None).await?;

        let mut old_by_key: HashMap<(String, String), Offer> = old_offers
            .into_iter()
            .map(|o| ((o.offered_by.clone(), o.id.clone()), o))
            .collect();
        let mut new_by_key: HashMap<(String, String), Offer> = new_offers
            .into_iter()
            .map(|o| ((o.offered_by.clone(), o.id.clone()), o))
            .collect();

        let keys: Vec<_> = old_by_key
            .keys()
            .chain(new_by_key.keys())
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let timestamp_utc = Utc
            .timestamp_millis_opt(new_t)
            .single()
            .unwrap_or_else(Utc::now);

        let changes = keys
            .into_iter()
            .skip(skip.unwrap_or(0))
            .filter_map(|key| {
                let old = old_by_key.remove(&key);
                let new = new_by_key.remove(&key);
                match (old, new) {
                    (None, Some(new)) => Some(OfferChange {
                        change_type: OfferChangeType::Add,
                        timestamp_utc,
                        old_value: None,
                        new_value: Some(new),
                    }),
                    (Some(old), None) => Some(OfferChange {
                        change_type: OfferChangeType::Delete,
                        timestamp_utc,
                        old_value: Some(old),
                        new_value: None,
                    }),
                    (Some(old), Some(new)) if old != new => Some(OfferChange {
                        change_type: OfferChangeType::Update,
                        timestamp_utc,
                        old_value: Some(old),
                        new_value: Some(new),
                    }),
                    _ => None,
                }
            })
            .collect();
        Ok(changes)
    }

    async fn write_accept(
        &self,
        _t: &dyn Transaction,
        host: &str,
        acceptance: StoredAcceptance,
    ) -> OprResult<()> {
        let mut data = self.data.write().await;
        data.hosts.entry(host.to_string()).or_default().acceptances.push(acceptance);
        Ok(())
    }

    async fn write_reject(
        &self,
        _t: &dyn Transaction,
        host: &str,
        rejection: StoredRejection,
    ) -> OprResult<()> {
        let mut data = self.data.write().await;
        let state = data.hosts.entry(host.to_string()).or_default();
        let exists = state.rejections.iter().any(|r| {
            r.rejecting_org_url == rejection.rejecting_org_url
                && r.offer_id == rejection.offer_id
                && r.posting_org_url == rejection.posting_org_url
        });
        if !exists {
            state.rejections.push(rejection);
        }
        Ok(())
    }

    async fn get_all_rejections(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Vec<StoredRejection>> {
        let data = self.data.read().await;
        Ok(data
            .hosts
            .get(host)
            .map(|state| {
                state
                    .rejections
                    .iter()
                    .filter(|r| r.offer_id == id && r.posting_org_url == posting_org)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_history(
        &self,
        _t: &dyn Transaction,
        host: &str,
        viewer: &str,
        skip: Option<usize>,
    ) -> OprResult<Vec<StoredAcceptance>> {
        let data = self.data.read().await;
        Ok(data
            .hosts
            .get(host)
            .map(|state| {
                state
                    .acceptances
                    .iter()
                    .filter(|a| a.viewers.iter().any(|v| v == viewer))
                    .skip(skip.unwrap_or(0))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_best_accept_chain(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<StoredReshareChain>> {
        let data = self.data.read().await;
        Ok(data
            .hosts
            .get(host)
            .and_then(|state| {
                state
                    .best_chains
                    .get(&(id.to_string(), posting_org.to_string(), ChainUse::Accept))
            })
            .cloned())
    }

    async fn get_best_reshare_chain_root(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<StoredReshareChain>> {
        let data = self.data.read().await;
        Ok(data
            .hosts
            .get(host)
            .and_then(|state| {
                state
                    .best_chains
                    .get(&(id.to_string(), posting_org.to_string(), ChainUse::Reshare))
            })
            .cloned())
    }

    async fn set_best_chain(
        &self,
        _t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
        for_use: ChainUse,
        chain: DecodedReshareChain,
        raw_jwts: Vec<String>,
    ) -> OprResult<()> {
        let mut data = self.data.write().await;
        data.hosts.entry(host.to_string()).or_default().best_chains.insert(
            (id.to_string(), posting_org.to_string(), for_use),
            StoredReshareChain {
                host_org_url: host.to_string(),
                offer_id: id.to_string(),
                posting_org_url: posting_org.to_string(),
                for_use,
                chain,
                raw_jwts,
            },
        );
        Ok(())
    }

    async fn write_offer_producer_metadata(
        &self,
        _t: &dyn Transaction,
        host: &str,
        metadata: ProducerMetadata,
    ) -> OprResult<()> {
        let mut data = self.data.write().await;
        data.hosts
            .entry(host.to_string())
            .or_default()
            .producer_metadata
            .insert(metadata.producer_id.clone(), metadata);
        Ok(())
    }

    async fn get_offer_producer_metadata(
        &self,
        _t: &dyn Transaction,
        host: &str,
        producer_id: &str,
    ) -> OprResult<Option<ProducerMetadata>> {
        let data = self.data.read().await;
        Ok(data
            .hosts
            .get(host)
            .and_then(|state| state.producer_metadata.get(producer_id))
            .cloned())
    }

    async fn store_value(
        &self,
        _t: &dyn Transaction,
        host: &str,
        key: &str,
        value: Value,
    ) -> OprResult<()> {
        let mut data = self.data.write().await;
        data.hosts
            .entry(host.to_string())
            .or_default()
            .kv
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn clear_all_values(&self, _t: &dyn Transaction, host: &str, prefix: &str) -> OprResult<()> {
        let mut data = self.data.write().await;
        if let Some(state) = data.hosts.get_mut(host) {
            state.kv.retain(|k, _| !k.starts_with(prefix));
        }
        Ok(())
    }

    async fn get_values(
        &self,
        _t: &dyn Transaction,
        host: &str,
        prefix: &str,
    ) -> OprResult<Vec<(String, Value)>> {
        let data = self.data.read().await;
        Ok(data
            .hosts
            .get(host)
            .map(|state| {
                state
                    .kv
                    .iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opr_core::timeline::WILDCARD_VIEWER;

    fn offer(id: &str, posting_org: &str, creation: i64) -> Offer {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "offeredBy": posting_org,
            "offerCreationUTC": creation,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn insert_then_reinsert_same_version_is_none() {
        let storage = InMemoryStorage::new();
        let t = storage.create_transaction(Isolation::ReadWrite).await.unwrap();
        let offer = offer("o1", "https://a.example/org.json", 1);
        assert_eq!(
            storage
                .insert_or_update_offer_in_corpus(t.as_ref(), "host", "corpus", &offer)
                .await
                .unwrap(),
            CorpusWriteResult::Add
        );
        assert_eq!(
            storage
                .insert_or_update_offer_in_corpus(t.as_ref(), "host", "corpus", &offer)
                .await
                .unwrap(),
            CorpusWriteResult::None
        );
    }

    #[tokio::test]
    async fn delete_from_last_corpus_reports_delete() {
        let storage = InMemoryStorage::new();
        let t = storage.create_transaction(Isolation::ReadWrite).await.unwrap();
        let offer = offer("o1", "https://a.example/org.json", 1);
        storage
            .insert_or_update_offer_in_corpus(t.as_ref(), "host", "corpus-a", &offer)
            .await
            .unwrap();
        storage
            .insert_or_update_offer_in_corpus(t.as_ref(), "host", "corpus-b", &offer)
            .await
            .unwrap();

        assert_eq!(
            storage
                .delete_offer_in_corpus(t.as_ref(), "host", "corpus-a", "o1", "https://a.example/org.json")
                .await
                .unwrap(),
            CorpusDeleteResult::None
        );
        assert_eq!(
            storage
                .delete_offer_in_corpus(t.as_ref(), "host", "corpus-b", "o1", "https://a.example/org.json")
                .await
                .unwrap(),
            CorpusDeleteResult::Delete
        );
    }

    #[tokio::test]
    async fn wildcard_entry_matches_every_non_host_viewer() {
        let storage = InMemoryStorage::new();
        let t = storage.create_transaction(Isolation::ReadWrite).await.unwrap();
        let offer = offer("o1", "https://a.example/org.json", 1);
        storage
            .insert_or_update_offer_in_corpus(t.as_ref(), "host", "corpus", &offer)
            .await
            .unwrap();
        storage
            .add_timeline_entries(
                t.as_ref(),
                "host",
                vec![TimelineEntry {
                    target_org_url: WILDCARD_VIEWER.to_string(),
                    offer_id: "o1".into(),
                    posting_org_url: "https://a.example/org.json".into(),
                    offer_update_utc: 1,
                    interval: Interval::new(0, 1000),
                    is_reservation: false,
                    reshare_chain: None,
                }],
            )
            .await
            .unwrap();

        let visible = storage
            .get_offers_at_time(t.as_ref(), "host", "https://viewer.example/org.json", 500, None)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);

        let host_view = storage
            .get_offers_at_time(t.as_ref(), "host", "host", 500, None)
            .await
            .unwrap();
        assert!(host_view.is_empty());
    }

    #[tokio::test]
    async fn truncate_future_timeline_caps_active_entry_and_drops_future_ones() {
        let storage = InMemoryStorage::new();
        let t = storage.create_transaction(Isolation::ReadWrite).await.unwrap();
        storage
            .add_timeline_entries(
                t.as_ref(),
                "host",
                vec![
                    TimelineEntry {
                        target_org_url: "https://b.example/org.json".into(),
                        offer_id: "o1".into(),
                        posting_org_url: "https://a.example/org.json".into(),
                        offer_update_utc: 1,
                        interval: Interval::new(0, 1000),
                        is_reservation: false,
                        reshare_chain: None,
                    },
                    TimelineEntry {
                        target_org_url: "https://b.example/org.json".into(),
                        offer_id: "o1".into(),
                        posting_org_url: "https://a.example/org.json".into(),
                        offer_update_utc: 1,
                        interval: Interval::new(2000, 3000),
                        is_reservation: false,
                        reshare_chain: None,
                    },
                ],
            )
            .await
            .unwrap();

        storage
            .truncate_future_timeline_for_offer(t.as_ref(), "host", "o1", "https://a.example/org.json", 500)
            .await
            .unwrap();

        let remaining = storage
            .get_timeline_for_offer(t.as_ref(), "host", "o1", "https://a.example/org.json", None, None)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].interval, Interval::new(0, 500));
    }
}
