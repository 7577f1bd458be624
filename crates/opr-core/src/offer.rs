//! The opaque offer payload and the semantic attributes the tenant core
//! reads out of it. The rest of the offer JSON is never interpreted here -
//! it is stored and relayed as an opaque value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reshare::ReshareChain;

/// An offer, as published by its posting org. Only the fields the tenant
/// core needs to reason about are promoted to struct fields; everything
/// else round-trips through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    #[serde(rename = "offeredBy")]
    pub offered_by: String,
    #[serde(rename = "offerCreationUTC")]
    pub offer_creation_utc: i64,
    #[serde(rename = "offerUpdateUTC", skip_serializing_if = "Option::is_none")]
    pub offer_update_utc: Option<i64>,
    #[serde(
        rename = "offerExpirationUTC",
        skip_serializing_if = "Option::is_none"
    )]
    pub offer_expiration_utc: Option<i64>,
    #[serde(
        rename = "maxReservationTimeSecs",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_reservation_time_secs: Option<i64>,
    #[serde(rename = "reshareChain", skip_serializing_if = "Option::is_none")]
    pub reshare_chain: Option<ReshareChain>,
    /// Every other field of the payload, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Offer {
    /// `offerUpdateUTC ?? offerCreationUTC`, the timestamp used to compare
    /// offer versions everywhere this crate reasons about recency.
    pub fn update_timestamp(&self) -> i64 {
        self.offer_update_utc.unwrap_or(self.offer_creation_utc)
    }

    /// Expiration as an exclusive upper bound, defaulting to "never" when
    /// absent (represented as `i64::MAX` so interval math stays total).
    pub fn expiration_or_max(&self) -> i64 {
        self.offer_expiration_utc.unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_timestamp_falls_back_to_creation() {
        let offer: Offer = serde_json::from_value(serde_json::json!({
            "id": "o1",
            "offeredBy": "https://a.example/org.json",
            "offerCreationUTC": 100,
        }))
        .unwrap();
        assert_eq!(offer.update_timestamp(), 100);
    }

    #[test]
    fn update_timestamp_prefers_update_field() {
        let offer: Offer = serde_json::from_value(serde_json::json!({
            "id": "o1",
            "offeredBy": "https://a.example/org.json",
            "offerCreationUTC": 100,
            "offerUpdateUTC": 200,
        }))
        .unwrap();
        assert_eq!(offer.update_timestamp(), 200);
    }

    #[test]
    fn extra_fields_round_trip() {
        let raw = serde_json::json!({
            "id": "o1",
            "offeredBy": "https://a.example/org.json",
            "offerCreationUTC": 100,
            "description": "surplus widgets",
        });
        let offer: Offer = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&offer).unwrap();
        assert_eq!(back["description"], raw["description"]);
    }
}
