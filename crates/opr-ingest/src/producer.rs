//! The producer seam: anything that can answer a LIST-shaped
//! request with a lazy offer or patch sequence, whether that's an
//! authenticated pull from a peer tenant or a locally installed source.

use async_trait::async_trait;

use opr_core::OprResult;
use opr_model::{ListOffersPayload, OfferSetUpdate};

/// One producer run's result: the update to apply plus the earliest
/// instant the scheduler should ask this producer again.
pub struct ProducedUpdate {
    pub update: OfferSetUpdate,
    pub earliest_next_request_utc: i64,
}

#[async_trait]
pub trait OfferProducer: Send + Sync {
    /// Stable id this producer is tracked under in producer metadata.
    fn producer_id(&self) -> &str;

    /// The org url the produced offers are published under - the corpus
    /// key `processUpdate` applies the returned update against.
    fn source_org_url(&self) -> &str;

    async fn produce_offers(&self, payload: ListOffersPayload) -> OprResult<ProducedUpdate>;
}
