//! Shared data model and status-error type for the Open Product Recovery
//! tenant core.
//!
//! This crate has no network, storage, or crypto dependencies of its own -
//! it defines the vocabulary (`Offer`, `StructuredOfferId`, `ReshareChain`,
//! `TimelineEntry`, `StatusError`) that every other `opr-*` crate builds on.

pub mod change;
pub mod clock;
pub mod error;
pub mod ids;
pub mod offer;
pub mod reshare;
pub mod timeline;

pub use change::{OfferChange, OfferChangeType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{codes, OprResult, StatusError};
pub use ids::{id_to_url, url_to_id, StructuredOfferId, VersionedOrPlainId, VersionedStructuredOfferId};
pub use offer::Offer;
pub use reshare::{parse_scopes, render_scopes, DecodedLink, DecodedReshareChain, ReshareChain, Scope};
pub use timeline::{Interval, TimelineEntry, WILDCARD_VIEWER};
