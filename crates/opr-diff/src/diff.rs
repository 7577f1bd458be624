//! The JSON-Patch diff between two canonicalized offer sets.

use json_patch::Patch;

use crate::canonical::OfferSet;

/// The patch that transforms `from`'s canonical form into `to`'s.
pub fn diff_offer_sets(from: &OfferSet, to: &OfferSet) -> Patch {
    json_patch::diff(&from.to_value(), &to.to_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::to_offer_set;

    fn offer(posting_org: &str, id: &str, creation: i64) -> opr_core::Offer {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "offeredBy": posting_org,
            "offerCreationUTC": creation,
        }))
        .unwrap()
    }

    #[test]
    fn identical_sets_diff_to_an_empty_patch() {
        let set = to_offer_set(vec![offer("https://a.example/org.json", "o1", 1)]);
        let patch = diff_offer_sets(&set, &set);
        assert!(patch.0.is_empty());
    }

    #[test]
    fn added_offer_produces_a_non_empty_patch() {
        let from = to_offer_set(vec![]);
        let to = to_offer_set(vec![offer("https://a.example/org.json", "o1", 1)]);
        let patch = diff_offer_sets(&from, &to);
        assert!(!patch.0.is_empty());
    }
}
