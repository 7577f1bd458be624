//! Verifying a single JWT's signature against its issuer's published JWKS.

use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

use opr_core::error::codes;
use opr_core::{OprResult, StatusError};

use crate::claims::ChainClaims;
use crate::decode::decode_payload_unsafe;
use crate::jwk::JwksResolver;

/// Verify a bearer token's signature and expiry, resolving the signer's
/// public key through `resolver`. Returns the validated claims.
pub async fn verify_token(jwt: &str, resolver: &dyn JwksResolver) -> OprResult<ChainClaims> {
    verify_signature(jwt, resolver, true).await
}

/// Shared by bearer-token verification (which requires `exp`) and
/// reshare-chain link verification (whose links carry no expiration).
pub(crate) async fn verify_signature(
    jwt: &str,
    resolver: &dyn JwksResolver,
    require_exp: bool,
) -> OprResult<ChainClaims> {
    let unverified: ChainClaims = decode_payload_unsafe(jwt)?;
    let jwks = resolver.get_jwks(&unverified.iss).await?;

    let header = decode_header(jwt)
        .map_err(|e| StatusError::unauthorized(codes::AUTH_ERROR, format!("bad JWT header: {e}")))?;

    let key = header
        .kid
        .as_deref()
        .and_then(|kid| jwks.find(kid))
        .or_else(|| jwks.keys.first())
        .ok_or_else(|| StatusError::unauthorized(codes::AUTH_ERROR, "no matching key in JWKS"))?;

    let decoding_key = DecodingKey::from_jwk(key)
        .map_err(|e| StatusError::unauthorized(codes::AUTH_ERROR, format!("unusable JWKS key: {e}")))?;

    let mut validation = Validation::new(header.alg);
    validation.validate_aud = false;
    if !require_exp {
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
    }

    match decode::<ChainClaims>(jwt, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(StatusError::unauthorized(
                codes::AUTH_ERROR_TOKEN_EXPIRED,
                "token has expired",
            )),
            _ => Err(StatusError::unauthorized(
                codes::AUTH_ERROR,
                format!("token verification failed: {e}"),
            )),
        },
    }
}
