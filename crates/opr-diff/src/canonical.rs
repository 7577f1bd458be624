//! Canonicalizing a collection of offers into the keyed form JSON-Patch
//! diffs operate over.

use std::collections::BTreeMap;

use opr_core::Offer;

/// The canonical form of an offer collection: keyed by `fullOfferId`
/// (`offeredBy#id`), values deep clones of the offers themselves.
///
/// A `BTreeMap` is used rather than a hash map so that the JSON produced
/// by [`to_value`](Self::to_value) has a stable key order, which keeps
/// diffs between snapshots deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferSet(pub BTreeMap<String, Offer>);

impl OfferSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).expect("Offer always serializes")
    }
}

/// Canonicalize a list of offers, keyed by `offeredBy#id`.
pub fn to_offer_set(offers: impl IntoIterator<Item = Offer>) -> OfferSet {
    let mut set = BTreeMap::new();
    for offer in offers {
        let key = format!("{}#{}", offer.offered_by, offer.id);
        set.insert(key, offer);
    }
    OfferSet(set)
}

/// The exact inverse of [`to_offer_set`] up to iteration order.
pub fn to_offer_list(set: &OfferSet) -> Vec<Offer> {
    set.0.values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(posting_org: &str, id: &str, creation: i64) -> Offer {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "offeredBy": posting_org,
            "offerCreationUTC": creation,
        }))
        .unwrap()
    }

    #[test]
    fn to_set_and_back_round_trips() {
        let offers = vec![
            offer("https://a.example/org.json", "o1", 1),
            offer("https://b.example/org.json", "o2", 2),
        ];
        let set = to_offer_set(offers.clone());
        let mut back = to_offer_list(&set);
        back.sort_by_key(|o| o.id.clone());
        assert_eq!(back, offers);
    }

    #[test]
    fn keys_are_offered_by_hash_id() {
        let set = to_offer_set(vec![offer("https://a.example/org.json", "o1", 1)]);
        assert!(set.0.contains_key("https://a.example/org.json#o1"));
    }
}
