//! The offer model and timeline engine: the component every tenant
//! node operation ultimately calls through. It owns the per-viewer
//! visibility timeline, applies producer updates against it, and serves
//! list/accept/reject/reserve/history.

pub mod events;
pub mod model;
pub mod types;

pub use events::{ChangeHandler, ChangeHandlerRegistry};
pub use model::{OfferModel, OfferSetUpdate};
pub use types::{
    AcceptPayload, AcceptResponse, HistoryPayload, HistoryResponse, ListOffersPayload,
    ListOffersResponse, ListResults, OfferHistoryEntry, PageToken, RejectPayload, RejectResponse,
    ReservePayload, ReserveResponse, ResponseFormat,
};
