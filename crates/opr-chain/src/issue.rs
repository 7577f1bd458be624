//! Issuing standalone bearer tokens.

use jsonwebtoken::{encode, Header};

use opr_core::OprResult;

use crate::claims::ChainClaims;
use crate::jwk::TenantSigningKey;

const DEFAULT_MAX_AGE_MILLIS: i64 = 600_000;

#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    pub sub: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub max_age_millis: Option<i64>,
}

/// Issue a signed bearer JWT: `iss` is the tenant's own org URL, `aud` the
/// caller-supplied audience, `exp = iat + maxAgeMillis/1000`.
pub fn issue_token(
    signing_key: &TenantSigningKey,
    tenant_org_url: &str,
    audience: &str,
    options: IssueOptions,
    now_millis: i64,
) -> OprResult<String> {
    let iat = now_millis / 1000;
    let max_age_secs = options.max_age_millis.unwrap_or(DEFAULT_MAX_AGE_MILLIS) / 1000;
    let claims = ChainClaims {
        iss: tenant_org_url.to_string(),
        sub: options.sub,
        aud: Some(audience.to_string()),
        iat: Some(iat),
        exp: Some(iat + max_age_secs),
        scope: options.scopes.map(|s| s.join(" ")),
        entitlements: None,
    };

    let mut header = Header::new(signing_key.alg);
    header.kid = signing_key.kid.clone();

    encode(&header, &claims, &signing_key.encoding_key)
        .map_err(|e| opr_core::StatusError::internal("AUTH_ERROR", format!("failed to sign token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    #[test]
    fn issues_token_with_expected_claims() {
        let key = TenantSigningKey::from_hmac_secret(Algorithm::HS256, b"secret", None);
        let token = issue_token(
            &key,
            "https://tenant.example/org.json",
            "https://peer.example/org.json",
            IssueOptions {
                sub: Some("https://peer.example/org.json".into()),
                scopes: Some(vec!["LISTPRODUCTS".into()]),
                max_age_millis: None,
            },
            10_000_000,
        )
        .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
    }
}
