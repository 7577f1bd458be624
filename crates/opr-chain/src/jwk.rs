//! The tenant's own signing key, and the trait used to fetch a peer's
//! public JWKS when verifying an inbound token.

use jsonwebtoken::{Algorithm, EncodingKey};
use serde::Deserialize;

use opr_core::error::{codes, StatusError};
use opr_core::OprResult;

/// A tenant's private signing key, derived from a JWK. The `alg` claim is
/// mandatory - a JWK without one fails to load with `JWK_NO_ALG`.
#[derive(Clone)]
pub struct TenantSigningKey {
    pub kid: Option<String>,
    pub alg: Algorithm,
    pub(crate) encoding_key: EncodingKey,
}

/// The subset of JWK fields this crate loads a private signing key from.
/// Real deployments keep this private JWK out of the published JWKS; only
/// its public counterpart (built the usual way, via `n`/`e` or `x`/`y`) is
/// exposed at the tenant's `jwksURL`.
#[derive(Debug, Deserialize)]
struct RawSigningJwk {
    kid: Option<String>,
    alg: Option<String>,
    kty: String,
    /// Symmetric key material (base64url), used when `kty == "oct"`.
    k: Option<String>,
    /// PEM-encoded private key, used when `kty` is `RSA` or `EC`. Real JWK
    /// serialization splits RSA/EC private keys into individual base64url
    /// components (`d`, `p`, `q`, ...); tenants that mint their own keys
    /// are free to keep the PEM around internally instead of round-tripping
    /// through those components, which is what this field models.
    pem: Option<String>,
}

impl TenantSigningKey {
    /// Build a signing key from a JWK JSON value.
    pub fn from_jwk_json(value: &serde_json::Value) -> OprResult<Self> {
        let raw: RawSigningJwk = serde_json::from_value(value.clone()).map_err(|e| {
            StatusError::bad_request("JWK_INVALID", format!("malformed signing JWK: {e}"))
        })?;
        let alg_str = raw
            .alg
            .as_deref()
            .ok_or_else(|| StatusError::bad_request(codes::JWK_NO_ALG, "JWK has no 'alg' field"))?;
        let alg = parse_algorithm(alg_str)?;

        let encoding_key = match raw.kty.as_str() {
            "oct" => {
                let k = raw.k.ok_or_else(|| {
                    StatusError::bad_request("JWK_INVALID", "oct JWK missing 'k'")
                })?;
                let secret = base64::Engine::decode(
                    &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                    k,
                )
                .map_err(|e| {
                    StatusError::bad_request("JWK_INVALID", format!("invalid 'k' encoding: {e}"))
                })?;
                EncodingKey::from_secret(&secret)
            }
            "RSA" => {
                let pem = raw.pem.ok_or_else(|| {
                    StatusError::bad_request("JWK_INVALID", "RSA signing JWK missing 'pem'")
                })?;
                EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                    StatusError::bad_request("JWK_INVALID", format!("invalid RSA pem: {e}"))
                })?
            }
            "EC" => {
                let pem = raw.pem.ok_or_else(|| {
                    StatusError::bad_request("JWK_INVALID", "EC signing JWK missing 'pem'")
                })?;
                EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| {
                    StatusError::bad_request("JWK_INVALID", format!("invalid EC pem: {e}"))
                })?
            }
            other => {
                return Err(StatusError::bad_request(
                    "JWK_INVALID",
                    format!("unsupported signing key type '{other}'"),
                ));
            }
        };

        Ok(Self {
            kid: raw.kid,
            alg,
            encoding_key,
        })
    }

    /// Build an HMAC signing key directly from a raw secret - the common
    /// case for tests and single-process deployments.
    pub fn from_hmac_secret(alg: Algorithm, secret: &[u8], kid: Option<String>) -> Self {
        Self {
            kid,
            alg,
            encoding_key: EncodingKey::from_secret(secret),
        }
    }
}

fn parse_algorithm(s: &str) -> OprResult<Algorithm> {
    match s {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        other => Err(StatusError::bad_request(
            "JWK_INVALID",
            format!("unsupported alg '{other}'"),
        )),
    }
}

/// Resolves a peer org's JWKS, used by [`crate::verify::verify_token`] to
/// fetch the key that signed an inbound bearer token or chain link. Backed
/// by `opr-orgconfig`'s org config resolver in production.
#[async_trait::async_trait]
pub trait JwksResolver: Send + Sync {
    async fn get_jwks(&self, org_url: &str) -> OprResult<jsonwebtoken::jwk::JwkSet>;
}
