//! Row types persisted by the storage layer.

use opr_core::reshare::DecodedReshareChain;
use serde_json::Value;

/// Isolation level requested for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    ReadOnly,
    ReadWrite,
}

/// Result of `insertOrUpdateOfferInCorpus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusWriteResult {
    Add,
    Update,
    None,
}

/// Result of `deleteOfferInCorpus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusDeleteResult {
    Delete,
    None,
}

/// `(offerId, postingOrgUrl, lastUpdateUTC) -> full offer JSON`. Immutable
/// once written and deduplicated by its full key.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferSnapshot {
    pub offer_id: String,
    pub posting_org_url: String,
    pub last_update_utc: i64,
    pub offer_json: Value,
    pub expiration_utc: i64,
}

/// `forUse` discriminator for [`StoredReshareChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainUse {
    Accept,
    Reshare,
}

/// The best chain currently known for a given `(offer, forUse)`, chosen by
/// the chain preference ordering.
#[derive(Debug, Clone)]
pub struct StoredReshareChain {
    pub host_org_url: String,
    pub offer_id: String,
    pub posting_org_url: String,
    pub for_use: ChainUse,
    pub chain: DecodedReshareChain,
    pub raw_jwts: Vec<String>,
}

/// A recorded acceptance plus the orgs permitted to see it.
#[derive(Debug, Clone)]
pub struct StoredAcceptance {
    pub offer_id: String,
    pub posting_org_url: String,
    pub last_update_utc: i64,
    pub accepted_by: String,
    pub accepted_at_utc: i64,
    pub decoded_reshare_chain: Option<DecodedReshareChain>,
    pub viewers: Vec<String>,
}

/// `(hostOrgUrl, rejectingOrgUrl, offerId, postingOrgUrl) -> rejectedAtUTC`.
/// Idempotent per key.
#[derive(Debug, Clone)]
pub struct StoredRejection {
    pub rejecting_org_url: String,
    pub offer_id: String,
    pub posting_org_url: String,
    pub rejected_at_utc: i64,
}

/// Per-producer lock and backoff state for the ingestion scheduler.
#[derive(Debug, Clone)]
pub struct ProducerMetadata {
    pub producer_id: String,
    pub last_update_time_utc: Option<i64>,
    pub next_run_timestamp_utc: i64,
}
