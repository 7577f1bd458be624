//! Offer change events emitted by the model.

use chrono::{DateTime, Utc};

use crate::offer::Offer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferChangeType {
    Add,
    Update,
    Delete,
    RemoteAccept,
    RemoteReject,
    RemoteReserve,
}

#[derive(Debug, Clone)]
pub struct OfferChange {
    pub change_type: OfferChangeType,
    pub timestamp_utc: DateTime<Utc>,
    pub old_value: Option<Offer>,
    pub new_value: Option<Offer>,
}
