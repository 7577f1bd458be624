//! Reshare-chain cryptography: issuing standalone bearer tokens and
//! signing, decoding and verifying the chained JWTs that delegate
//! ACCEPT/RESHARE rights across a hop of resharing orgs.
//!
//! A chain link's `entitlements` claim binds it to the raw signature
//! segment of its predecessor, so a chain can only be extended by whoever
//! holds the previous link - nobody else knows that segment before the
//! link is published.

pub mod chain;
pub mod claims;
pub mod decode;
pub mod issue;
pub mod jwk;
pub mod verify;

pub use chain::{
    compare_accept_preference, compare_reshare_preference, decode_chain, is_accept_qualified,
    is_reshare_qualified, sign_chain, verify_chain, SignChainOptions, VerifyChainOptions,
};
pub use claims::ChainClaims;
pub use decode::{decode_payload_unsafe, signature_segment, split_jwt, JwtSegments};
pub use issue::{issue_token, IssueOptions};
pub use jwk::{JwksResolver, TenantSigningKey};
pub use verify::verify_token;
