//! The claim set carried by both standalone bearer tokens and reshare-chain
//! links. One shape serves both uses: a chain link simply sets
//! `entitlements` and omits `exp`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainClaims {
    pub iss: String,
    pub sub: Option<String>,
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<String>,
}
