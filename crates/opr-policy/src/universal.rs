//! The universal-accept policy: every configured org may accept every
//! offer directly, for as long as it exists.

use std::collections::HashSet;

use opr_core::reshare::Scope;
use opr_core::{Offer, OprResult};

use crate::listing::{Listing, ListingPolicy};

/// Lists every offer to every org in `orgs`, except those that have
/// already rejected it or resharing it to.
pub struct UniversalAcceptPolicy {
    pub orgs: Vec<String>,
}

impl UniversalAcceptPolicy {
    pub fn new(orgs: Vec<String>) -> Self {
        Self { orgs }
    }
}

#[async_trait::async_trait]
impl ListingPolicy for UniversalAcceptPolicy {
    async fn get_listings(
        &self,
        offer: &Offer,
        _first_listing_time_utc: i64,
        _current_time_utc: i64,
        rejections: &HashSet<String>,
        shared_by: &HashSet<String>,
    ) -> OprResult<Vec<Listing>> {
        let start = offer.offer_creation_utc;
        let end = offer.expiration_or_max();
        Ok(self
            .orgs
            .iter()
            .filter(|org| !rejections.contains(*org) && !shared_by.contains(*org))
            .map(|org| Listing {
                org_url: org.clone(),
                start_time_utc: start,
                end_time_utc: end,
                scopes: vec![Scope::Accept],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(creation: i64, expiration: Option<i64>) -> Offer {
        let mut value = serde_json::json!({
            "id": "o1",
            "offeredBy": "https://a.example/org.json",
            "offerCreationUTC": creation,
        });
        if let Some(exp) = expiration {
            value["offerExpirationUTC"] = serde_json::json!(exp);
        }
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn lists_every_org_not_rejected_or_shared() {
        let policy = UniversalAcceptPolicy::new(vec![
            "https://b.example/org.json".into(),
            "https://c.example/org.json".into(),
        ]);
        let rejections = HashSet::from(["https://b.example/org.json".to_string()]);
        let shared_by = HashSet::new();
        let listings = policy
            .get_listings(&offer(100, Some(200)), 0, 0, &rejections, &shared_by)
            .await
            .unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].org_url, "https://c.example/org.json");
        assert_eq!(listings[0].start_time_utc, 100);
        assert_eq!(listings[0].end_time_utc, 200);
    }

    #[tokio::test]
    async fn open_ended_offer_lists_to_i64_max() {
        let policy = UniversalAcceptPolicy::new(vec!["https://b.example/org.json".into()]);
        let listings = policy
            .get_listings(&offer(100, None), 0, 0, &HashSet::new(), &HashSet::new())
            .await
            .unwrap();
        assert_eq!(listings[0].end_time_utc, i64::MAX);
    }
}
