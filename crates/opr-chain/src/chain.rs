//! Signing, decoding and verifying reshare chains: sign chain, decode
//! chain, verify chain, and chain preference ordering.

use std::cmp::Ordering;

use jsonwebtoken::{encode, Header};

use opr_core::error::codes;
use opr_core::reshare::{parse_scopes, DecodedLink, DecodedReshareChain, ReshareChain, Scope};
use opr_core::{OprResult, StatusError};

use crate::claims::ChainClaims;
use crate::decode::{decode_payload_unsafe, signature_segment};
use crate::jwk::{JwksResolver, TenantSigningKey};
use crate::verify::verify_signature;

#[derive(Debug, Clone, Default)]
pub struct SignChainOptions {
    pub initial_entitlement: Option<String>,
    pub scopes: Option<Vec<String>>,
}

/// Append a new link to `chain`, authorizing `sub` to act on the
/// entitlement carried by the chain's last link (or `initialEntitlement`
/// when the chain is empty).
pub fn sign_chain(
    chain: &ReshareChain,
    signing_key: &TenantSigningKey,
    tenant_org_url: &str,
    sub: &str,
    options: SignChainOptions,
) -> OprResult<ReshareChain> {
    let entitlement = if chain.is_empty() {
        options.initial_entitlement.ok_or_else(|| {
            StatusError::bad_request(
                codes::CHAIN_NO_ENTITLEMENT,
                "cannot sign the first chain link without an initial entitlement",
            )
        })?
    } else {
        signature_segment(chain.last_jwt().expect("non-empty chain has a last jwt"))?.to_string()
    };

    let claims = ChainClaims {
        iss: tenant_org_url.to_string(),
        sub: Some(sub.to_string()),
        aud: None,
        iat: None,
        exp: None,
        scope: options.scopes.map(|s| s.join(" ")),
        entitlements: Some(entitlement),
    };

    let mut header = Header::new(signing_key.alg);
    header.kid = signing_key.kid.clone();

    let jwt = encode(&header, &claims, &signing_key.encoding_key)
        .map_err(|e| StatusError::internal(codes::AUTH_ERROR, format!("failed to sign chain link: {e}")))?;

    Ok(chain.appended(jwt))
}

/// Decode every link's payload without checking any signature.
pub fn decode_chain(chain: &ReshareChain) -> OprResult<DecodedReshareChain> {
    let mut links = Vec::with_capacity(chain.len());
    for jwt in &chain.0 {
        let claims: ChainClaims = decode_payload_unsafe(jwt)?;
        let signature = signature_segment(jwt)?.to_string();
        links.push(DecodedLink {
            sharing_org_url: claims.iss,
            recipient_org_url: claims.sub.unwrap_or_default(),
            entitlements: claims.entitlements.unwrap_or_default(),
            signature,
            scopes: claims
                .scope
                .map(|s| parse_scopes(&s))
                .unwrap_or_default(),
        });
    }
    Ok(DecodedReshareChain(links))
}

#[derive(Debug, Clone, Default)]
pub struct VerifyChainOptions {
    pub initial_issuer: Option<String>,
    pub initial_entitlements: Option<String>,
    pub final_subject: Option<String>,
    pub final_scope: Option<Scope>,
}

/// Verify every link's signature and the cross-link binding invariants,
/// returning the decoded chain on success.
pub async fn verify_chain(
    chain: &ReshareChain,
    resolver: &dyn JwksResolver,
    options: VerifyChainOptions,
) -> OprResult<DecodedReshareChain> {
    if chain.is_empty() {
        return Err(StatusError::bad_request(codes::CHAIN_EMPTY, "reshare chain is empty"));
    }

    for jwt in &chain.0 {
        verify_signature(jwt, resolver, false).await?;
    }

    let decoded = decode_chain(chain)?;
    let links = &decoded.0;

    if let Some(expected) = &options.initial_issuer {
        if &links[0].sharing_org_url != expected {
            return Err(StatusError::unauthorized(
                codes::CHAIN_TOKEN_BAD_INITIAL_ISSUER,
                "chain's first link was not issued by the expected org",
            ));
        }
    }

    if let Some(expected) = &options.initial_entitlements {
        if &links[0].entitlements != expected {
            return Err(StatusError::unauthorized(
                codes::CHAIN_TOKEN_BAD_INITIAL_ENTITLEMENTS,
                "chain's first link carries the wrong entitlement",
            ));
        }
    }

    if let Some(expected) = &options.final_subject {
        if &links[links.len() - 1].recipient_org_url != expected {
            return Err(StatusError::unauthorized(
                codes::CHAIN_TOKEN_BAD_FINAL_SUBJECT,
                "chain's final link does not name the expected subject",
            ));
        }
    }

    for i in 1..links.len() {
        if links[i].sharing_org_url != links[i - 1].recipient_org_url {
            return Err(StatusError::unauthorized(
                codes::CHAIN_TOKEN_ISSUER_SUBJECT_MISMATCH,
                "chain link was not issued by the prior link's recipient",
            ));
        }
        if links[i].entitlements != links[i - 1].signature {
            return Err(StatusError::unauthorized(
                codes::CHAIN_TOKEN_ENTITLEMENTS_MISMATCH,
                "chain link is not bound to its predecessor's signature",
            ));
        }
    }

    for link in &links[..links.len() - 1] {
        if !link.scopes.contains(&Scope::Reshare) {
            return Err(StatusError::unauthorized(
                codes::CHAIN_TOKEN_MISSING_RESHARE_SCOPE,
                "an intermediate chain link lacks RESHARE scope",
            ));
        }
    }

    if let Some(expected) = &options.final_scope {
        if !links[links.len() - 1].scopes.contains(expected) {
            return Err(StatusError::unauthorized(
                codes::CHAIN_TOKEN_BAD_FINAL_SCOPE,
                "chain's final link lacks the required scope",
            ));
        }
    }

    Ok(decoded)
}

/// Whether `chain`'s last link carries `ACCEPT` scope, or the chain is
/// absent (implicit direct accept is always accept-qualified).
pub fn is_accept_qualified(chain: Option<&DecodedReshareChain>) -> bool {
    match chain {
        None => true,
        Some(c) => c
            .last()
            .map(|link| link.scopes.contains(&Scope::Accept))
            .unwrap_or(true),
    }
}

/// Whether `chain`'s last link carries `RESHARE` scope.
pub fn is_reshare_qualified(chain: &DecodedReshareChain) -> bool {
    chain
        .last()
        .map(|link| link.scopes.contains(&Scope::Reshare))
        .unwrap_or(true)
}

/// Orders accept-qualified chains shortest-first; `None` (the implicit,
/// chain-free accept) sorts before every present chain, including the
/// empty one. Panics-free: unqualified chains compare as if longer than
/// any qualified chain, so callers should filter by
/// [`is_accept_qualified`] first.
pub fn compare_accept_preference(
    a: Option<&DecodedReshareChain>,
    b: Option<&DecodedReshareChain>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.0.len().cmp(&b.0.len()),
    }
}

/// Orders reshare-qualified chains shortest-first.
pub fn compare_reshare_preference(a: &DecodedReshareChain, b: &DecodedReshareChain) -> Ordering {
    a.0.len().cmp(&b.0.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jsonwebtoken::jwk::{AlgorithmParameters, CommonParameters, Jwk, JwkSet, OctetKeyParameters, OctetKeyType};
    use jsonwebtoken::Algorithm;

    struct StaticResolver(JwkSet);

    #[async_trait]
    impl JwksResolver for StaticResolver {
        async fn get_jwks(&self, _org_url: &str) -> OprResult<JwkSet> {
            Ok(self.0.clone())
        }
    }

    fn hmac_jwk(kid: &str, secret: &[u8]) -> Jwk {
        Jwk {
            common: CommonParameters {
                key_id: Some(kid.to_string()),
                ..Default::default()
            },
            algorithm: AlgorithmParameters::OctetKey(OctetKeyParameters {
                key_type: OctetKeyType::Octet,
                value: base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, secret),
            }),
        }
    }

    fn signing_key(kid: &str, secret: &[u8]) -> TenantSigningKey {
        TenantSigningKey::from_hmac_secret(Algorithm::HS256, secret, Some(kid.to_string()))
    }

    #[tokio::test]
    async fn signs_and_verifies_two_link_chain() {
        let a_key = signing_key("a", b"secret-a");
        let b_key = signing_key("b", b"secret-b");
        let jwks = JwkSet {
            keys: vec![hmac_jwk("a", b"secret-a"), hmac_jwk("b", b"secret-b")],
        };
        let resolver = StaticResolver(jwks);

        let empty = ReshareChain::empty();
        let chain = sign_chain(
            &empty,
            &a_key,
            "https://a.example/org.json",
            "https://b.example/org.json",
            SignChainOptions {
                initial_entitlement: Some("root-entitlement".into()),
                scopes: Some(vec!["RESHARE".into()]),
            },
        )
        .unwrap();

        let chain = sign_chain(
            &chain,
            &b_key,
            "https://b.example/org.json",
            "https://c.example/org.json",
            SignChainOptions {
                scopes: Some(vec!["ACCEPT".into()]),
                initial_entitlement: None,
            },
        )
        .unwrap();

        let decoded = verify_chain(
            &chain,
            &resolver,
            VerifyChainOptions {
                initial_issuer: Some("https://a.example/org.json".into()),
                initial_entitlements: Some("root-entitlement".into()),
                final_subject: Some("https://c.example/org.json".into()),
                final_scope: Some(Scope::Accept),
            },
        )
        .await
        .unwrap();

        assert_eq!(decoded.0.len(), 2);
    }

    #[test]
    fn accept_preference_prefers_implicit_then_shorter() {
        let one_link = DecodedReshareChain(vec![DecodedLink {
            sharing_org_url: "a".into(),
            recipient_org_url: "b".into(),
            entitlements: String::new(),
            signature: "sig".into(),
            scopes: vec![Scope::Accept],
        }]);
        let two_link = DecodedReshareChain(vec![
            one_link.0[0].clone(),
            one_link.0[0].clone(),
        ]);

        assert_eq!(compare_accept_preference(None, Some(&one_link)), Ordering::Less);
        assert_eq!(
            compare_accept_preference(Some(&one_link), Some(&two_link)),
            Ordering::Less
        );
        assert_eq!(compare_accept_preference(None, None), Ordering::Equal);
    }
}
