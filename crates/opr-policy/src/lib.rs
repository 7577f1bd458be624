//! Listing policy: the pure function deciding which orgs may see a given
//! offer, with what scopes, and for how long.

pub mod hierarchical;
pub mod listing;
pub mod universal;

pub use hierarchical::{HierarchicalPolicy, HierarchyNode};
pub use listing::{Listing, ListingPolicy};
pub use universal::UniversalAcceptPolicy;
