//! Canonicalizing offer collections and diffing/patching them with
//! JSON-Patch.

pub mod canonical;
pub mod diff;
pub mod patch;

pub use canonical::{to_offer_list, to_offer_set, OfferSet};
pub use diff::diff_offer_sets;
pub use patch::{apply_offer_patch, touches_only_root, validate_target, OfferPatch, PatchOutcome};
