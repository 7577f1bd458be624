//! Transactional storage interface for offer snapshots, timelines,
//! acceptances, rejections, producer metadata and chain artifacts, plus
//! an in-memory implementation.

pub mod memory;
pub mod store;
pub mod transaction;
pub mod types;

pub use memory::InMemoryStorage;
pub use store::Storage;
pub use transaction::Transaction;
pub use types::{
    ChainUse, CorpusDeleteResult, CorpusWriteResult, Isolation, OfferSnapshot, ProducerMetadata,
    StoredAcceptance, StoredRejection, StoredReshareChain,
};
