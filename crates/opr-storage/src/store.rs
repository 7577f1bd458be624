//! The storage interface the model depends on. Every method takes
//! the transaction it runs under as its first argument.

use async_trait::async_trait;
use serde_json::Value;

use opr_core::reshare::DecodedReshareChain;
use opr_core::timeline::{Interval, TimelineEntry};
use opr_core::{Offer, OfferChange, OprResult};

use crate::transaction::Transaction;
use crate::types::{
    ChainUse, CorpusDeleteResult, CorpusWriteResult, Isolation, ProducerMetadata,
    StoredAcceptance, StoredRejection, StoredReshareChain,
};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_transaction(&self, isolation: Isolation) -> OprResult<Box<dyn Transaction>>;

    async fn insert_or_update_offer_in_corpus(
        &self,
        t: &dyn Transaction,
        host: &str,
        corpus: &str,
        offer: &Offer,
    ) -> OprResult<CorpusWriteResult>;

    async fn delete_offer_in_corpus(
        &self,
        t: &dyn Transaction,
        host: &str,
        corpus: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<CorpusDeleteResult>;

    async fn get_offer(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<Offer>>;

    async fn get_offer_from_corpus(
        &self,
        t: &dyn Transaction,
        host: &str,
        corpus: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<Offer>>;

    /// Every corpus of `host` that currently publishes this offer.
    async fn get_offer_sources(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Vec<String>>;

    async fn get_corpus_offers(
        &self,
        t: &dyn Transaction,
        host: &str,
        corpus: &str,
    ) -> OprResult<Vec<Offer>>;

    async fn get_timeline_for_offer(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
        interval: Option<Interval>,
        target_org: Option<&str>,
    ) -> OprResult<Vec<TimelineEntry>>;

    /// Callers guarantee the entries do not overlap any existing entry for
    /// the same `(host, target, offer)`.
    async fn add_timeline_entries(
        &self,
        t: &dyn Transaction,
        host: &str,
        entries: Vec<TimelineEntry>,
    ) -> OprResult<()>;

    /// Entries whose interval contains `at_time` are truncated to end at
    /// `at_time`; entries starting at or after `at_time` are removed.
    async fn truncate_future_timeline_for_offer(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
        at_time: i64,
    ) -> OprResult<()>;

    /// Wildcard-aware: when both a wildcard and an explicit entry match,
    /// the newest snapshot wins. The wildcard never matches `viewer ==
    /// host`.
    async fn get_offers_at_time(
        &self,
        t: &dyn Transaction,
        host: &str,
        viewer: &str,
        at_time: i64,
        skip: Option<usize>,
    ) -> OprResult<Vec<Offer>>;

    async fn get_offer_at_time(
        &self,
        t: &dyn Transaction,
        host: &str,
        viewer: &str,
        id: &str,
        posting_org: &str,
        at_time: i64,
    ) -> OprResult<Option<Offer>>;

    /// Outer-joined on `(posting org, offer id)` between the sets visible
    /// at `old_t` and `new_t`, so inserts and deletes are reported along
    /// with updates.
    async fn get_changed_offers(
        &self,
        t: &dyn Transaction,
        host: &str,
        viewer: &str,
        old_t: i64,
        new_t: i64,
        skip: Option<usize>,
    ) -> OprResult<Vec<OfferChange>>;

    async fn write_accept(
        &self,
        t: &dyn Transaction,
        host: &str,
        acceptance: StoredAcceptance,
    ) -> OprResult<()>;

    async fn write_reject(
        &self,
        t: &dyn Transaction,
        host: &str,
        rejection: StoredRejection,
    ) -> OprResult<()>;

    async fn get_all_rejections(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Vec<StoredRejection>>;

    async fn get_history(
        &self,
        t: &dyn Transaction,
        host: &str,
        viewer: &str,
        skip: Option<usize>,
    ) -> OprResult<Vec<StoredAcceptance>>;

    async fn get_best_accept_chain(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<StoredReshareChain>>;

    async fn get_best_reshare_chain_root(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
    ) -> OprResult<Option<StoredReshareChain>>;

    /// Record `chain` as the best chain known for `(id, posting_org,
    /// for_use)`. Callers are responsible for running the chain preference
    /// ordering themselves before deciding to call this.
    async fn set_best_chain(
        &self,
        t: &dyn Transaction,
        host: &str,
        id: &str,
        posting_org: &str,
        for_use: ChainUse,
        chain: DecodedReshareChain,
        raw_jwts: Vec<String>,
    ) -> OprResult<()>;

    async fn write_offer_producer_metadata(
        &self,
        t: &dyn Transaction,
        host: &str,
        metadata: ProducerMetadata,
    ) -> OprResult<()>;

    async fn get_offer_producer_metadata(
        &self,
        t: &dyn Transaction,
        host: &str,
        producer_id: &str,
    ) -> OprResult<Option<ProducerMetadata>>;

    async fn store_value(
        &self,
        t: &dyn Transaction,
        host: &str,
        key: &str,
        value: Value,
    ) -> OprResult<()>;

    async fn clear_all_values(&self, t: &dyn Transaction, host: &str, prefix: &str) -> OprResult<()>;

    async fn get_values(
        &self,
        t: &dyn Transaction,
        host: &str,
        prefix: &str,
    ) -> OprResult<Vec<(String, Value)>>;
}
