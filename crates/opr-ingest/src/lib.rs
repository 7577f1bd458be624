//! The ingestion scheduler: pulls updates from every registered
//! producer on a per-producer lock-and-backoff schedule and applies them
//! to an [`opr_model::OfferModel`].

pub mod feed;
pub mod producer;
pub mod scheduler;

pub use feed::FeedProducer;
pub use producer::{OfferProducer, ProducedUpdate};
pub use scheduler::IngestionScheduler;
