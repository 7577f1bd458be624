//! The listing policy seam: a pure async function from an offer and
//! the orgs that have already rejected or reshared it, to the set of
//! listings that should now exist for it.

use std::collections::HashSet;

use opr_core::reshare::Scope;
use opr_core::{Offer, OprResult};

/// One org's visibility window into a single offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub org_url: String,
    pub start_time_utc: i64,
    pub end_time_utc: i64,
    pub scopes: Vec<Scope>,
}

/// A pluggable policy deciding who may see a given offer and when.
/// Implementations must be pure functions of their inputs - no side
/// effects, no hidden state beyond what's passed in.
#[async_trait::async_trait]
pub trait ListingPolicy: Send + Sync {
    async fn get_listings(
        &self,
        offer: &Offer,
        first_listing_time_utc: i64,
        current_time_utc: i64,
        rejections: &HashSet<String>,
        shared_by: &HashSet<String>,
    ) -> OprResult<Vec<Listing>>;
}
