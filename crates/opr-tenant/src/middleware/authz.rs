//! The back half of the authenticated request flow: the ACL check and,
//! for Accept/Reserve, verifying an attached reshare chain in place of
//! ACL membership.

use opr_chain::{verify_chain, JwksResolver, VerifyChainOptions};
use opr_core::error::codes;
use opr_core::reshare::{DecodedReshareChain, ReshareChain, Scope};
use opr_core::{OprResult, StatusError};

use crate::acl::AccessControlList;

pub async fn require_acl(acl: &dyn AccessControlList, issuer: &str) -> OprResult<()> {
    if acl.is_allowed(issuer).await {
        Ok(())
    } else {
        Err(StatusError::forbidden(
            codes::AUTH_ERROR_ORG_NOT_AUTHORIZED,
            "org is not authorized for this tenant",
        ))
    }
}

/// Runs the ACL check unless a present, non-empty reshare chain supplies
/// its own authorization, in which case the chain is verified instead and
/// returned for the caller to pass into the model operation.
pub async fn authorize_with_optional_chain(
    acl: &dyn AccessControlList,
    resolver: &dyn JwksResolver,
    host_org_url: &str,
    issuer: &str,
    offer_id: &str,
    reshare_chain: Option<&ReshareChain>,
) -> OprResult<Option<DecodedReshareChain>> {
    match reshare_chain {
        Some(chain) if !chain.is_empty() => {
            let decoded = verify_chain(
                chain,
                resolver,
                VerifyChainOptions {
                    initial_issuer: Some(host_org_url.to_string()),
                    initial_entitlements: Some(offer_id.to_string()),
                    final_subject: Some(issuer.to_string()),
                    final_scope: Some(Scope::Accept),
                },
            )
            .await?;
            Ok(Some(decoded))
        }
        _ => {
            require_acl(acl, issuer).await?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AllowAllAcl, AllowListAcl};
    use async_trait::async_trait;
    use jsonwebtoken::jwk::JwkSet;

    struct NoJwks;

    #[async_trait]
    impl JwksResolver for NoJwks {
        async fn get_jwks(&self, _org_url: &str) -> OprResult<JwkSet> {
            Err(StatusError::internal("NO_KEYSET_SPECIFIED", "unused in this test"))
        }
    }

    #[tokio::test]
    async fn no_chain_falls_back_to_acl() {
        let result = authorize_with_optional_chain(
            &AllowAllAcl,
            &NoJwks,
            "https://host.example/org.json",
            "https://peer.example/org.json",
            "offer-1",
            None,
        )
        .await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_chain_and_denied_acl_fails_org_not_authorized() {
        let acl = AllowListAcl::new(vec!["https://other.example/org.json".to_string()]);
        let err = authorize_with_optional_chain(
            &acl,
            &NoJwks,
            "https://host.example/org.json",
            "https://peer.example/org.json",
            "offer-1",
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, codes::AUTH_ERROR_ORG_NOT_AUTHORIZED);
    }
}
