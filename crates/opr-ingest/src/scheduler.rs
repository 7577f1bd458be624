//! The ingestion scheduler's main loop: per-producer locking,
//! rate-limiting against `nextRunTimestampUTC`, and exponential-free
//! fixed backoff on failure.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use opr_core::{Clock, OprResult};
use opr_model::{ListOffersPayload, OfferModel, ResponseFormat};
use opr_storage::{Isolation, ProducerMetadata, Storage};

use crate::producer::OfferProducer;

const DEFAULT_FAILED_RETRY_INTERVAL_MILLIS: i64 = 10_000;

/// Guards one producer's lock slot for the lifetime of a single ingest
/// pass; dropping it always releases the slot, even on early return.
struct ProducerLockGuard {
    locks: Arc<DashMap<String, ()>>,
    producer_id: String,
}

impl Drop for ProducerLockGuard {
    fn drop(&mut self) {
        self.locks.remove(&self.producer_id);
    }
}

fn try_lock(locks: &Arc<DashMap<String, ()>>, producer_id: &str) -> Option<ProducerLockGuard> {
    match locks.entry(producer_id.to_string()) {
        dashmap::mapref::entry::Entry::Occupied(_) => None,
        dashmap::mapref::entry::Entry::Vacant(v) => {
            v.insert(());
            Some(ProducerLockGuard {
                locks: Arc::clone(locks),
                producer_id: producer_id.to_string(),
            })
        }
    }
}

/// Runs every registered producer through one ingestion pass, applying
/// whatever update it returns to the shared offer model.
pub struct IngestionScheduler {
    host_org_url: String,
    model: Arc<OfferModel>,
    storage: Arc<dyn Storage>,
    producers: Vec<Arc<dyn OfferProducer>>,
    locks: Arc<DashMap<String, ()>>,
    clock: Arc<dyn Clock>,
    failed_retry_interval_millis: i64,
}

impl IngestionScheduler {
    pub fn new(
        host_org_url: impl Into<String>,
        model: Arc<OfferModel>,
        storage: Arc<dyn Storage>,
        producers: Vec<Arc<dyn OfferProducer>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            host_org_url: host_org_url.into(),
            model,
            storage,
            producers,
            locks: Arc::new(DashMap::new()),
            clock,
            failed_retry_interval_millis: DEFAULT_FAILED_RETRY_INTERVAL_MILLIS,
        }
    }

    pub fn with_failed_retry_interval_millis(mut self, millis: i64) -> Self {
        self.failed_retry_interval_millis = millis;
        self
    }

    /// One ingestion pass over every registered producer.
    pub async fn ingest(&self) {
        for producer in &self.producers {
            self.ingest_one(producer.as_ref()).await;
        }
    }

    async fn ingest_one(&self, producer: &dyn OfferProducer) {
        let producer_id = producer.producer_id();
        let Some(_guard) = try_lock(&self.locks, producer_id) else {
            info!(producer_id, "ingestion already in progress for this producer, skipping");
            return;
        };

        if let Err(e) = self.run_producer(producer).await {
            warn!(producer_id, error = %e.message, code = %e.code, "ingestion run failed");
        }
    }

    /// Reads and writes producer metadata in their own short transactions
    /// rather than one held across the whole run: [`OfferModel::process_update`]
    /// opens its own `READWRITE` transaction, and a single in-memory
    /// storage only ever grants one writer at a time, so a transaction
    /// spanning the producer call would deadlock against the model's.
    async fn run_producer(&self, producer: &dyn OfferProducer) -> OprResult<()> {
        let producer_id = producer.producer_id();
        let now = self.clock.now_millis();

        let existing = self.read_metadata(producer_id).await?;
        if let Some(metadata) = &existing {
            if metadata.next_run_timestamp_utc > now {
                return Ok(());
            }
        }

        let payload = ListOffersPayload {
            requested_result_format: Some(ResponseFormat::Diff),
            diff_start_timestamp_utc: existing.as_ref().and_then(|m| m.last_update_time_utc),
            max_results_per_page: 100,
            page_token: None,
        };

        let produced = match producer.produce_offers(payload).await {
            Ok(produced) => produced,
            Err(e) => {
                self.write_backoff(producer_id, &existing, now).await?;
                return Err(e);
            }
        };

        match self.model.process_update(producer.source_org_url(), produced.update).await {
            Ok(()) => {
                self.write_metadata(producer_id, Some(now), produced.earliest_next_request_utc)
                    .await
            }
            Err(e) => {
                self.write_backoff(producer_id, &existing, now).await?;
                Err(e)
            }
        }
    }

    async fn read_metadata(&self, producer_id: &str) -> OprResult<Option<ProducerMetadata>> {
        let t = self.storage.create_transaction(Isolation::ReadOnly).await?;
        let metadata = self
            .storage
            .get_offer_producer_metadata(t.as_ref(), &self.host_org_url, producer_id)
            .await?;
        t.commit().await?;
        Ok(metadata)
    }

    async fn write_metadata(
        &self,
        producer_id: &str,
        last_update_time_utc: Option<i64>,
        next_run_timestamp_utc: i64,
    ) -> OprResult<()> {
        let t = self.storage.create_transaction(Isolation::ReadWrite).await?;
        let metadata = ProducerMetadata {
            producer_id: producer_id.to_string(),
            last_update_time_utc,
            next_run_timestamp_utc,
        };
        match self
            .storage
            .write_offer_producer_metadata(t.as_ref(), &self.host_org_url, metadata)
            .await
        {
            Ok(()) => t.commit().await,
            Err(e) => {
                let _ = t.fail().await;
                Err(e)
            }
        }
    }

    async fn write_backoff(
        &self,
        producer_id: &str,
        existing: &Option<ProducerMetadata>,
        now: i64,
    ) -> OprResult<()> {
        self.write_metadata(
            producer_id,
            existing.as_ref().and_then(|m| m.last_update_time_utc),
            now + self.failed_retry_interval_millis,
        )
        .await
    }
}
