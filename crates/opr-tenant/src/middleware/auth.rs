//! The front half of the authenticated request flow: bearer header
//! parsing, token verification, and the audience check. Scope checking is
//! exposed separately since required scopes differ per handler.

use axum::http::HeaderMap;

use opr_chain::{verify_token, JwksResolver};
use opr_core::error::codes;
use opr_core::{OprResult, StatusError};

/// The verified identity of an inbound federated request: the issuing
/// org and the scopes its token carries.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest {
    pub issuer: String,
    pub scopes: Vec<String>,
}

pub fn extract_bearer(headers: &HeaderMap) -> OprResult<&str> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| StatusError::unauthorized(codes::NO_AUTH_HEADER, "missing Authorization header"))?;

    let value = value.to_str().map_err(|_| {
        StatusError::unauthorized(codes::BAD_AUTH_HEADER, "Authorization header is not valid UTF-8")
    })?;

    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        StatusError::unauthorized(
            codes::AUTH_HEADER_NO_BEARER_PREFIX,
            "Authorization header is missing the 'Bearer ' prefix",
        )
    })?;

    if token.is_empty() {
        return Err(StatusError::unauthorized(codes::AUTH_HEADER_EMPTY_TOKEN, "bearer token is empty"));
    }

    Ok(token)
}

/// Runs steps 1-2: parse the bearer token, verify its signature and
/// expiry, and check `iss`/`aud` against this tenant.
pub async fn authenticate(
    headers: &HeaderMap,
    resolver: &dyn JwksResolver,
    host_org_url: &str,
) -> OprResult<AuthenticatedRequest> {
    let token = extract_bearer(headers)?;
    let claims = verify_token(token, resolver).await?;

    if claims.iss.is_empty() {
        return Err(StatusError::unauthorized(
            codes::AUTH_ERROR_MISSING_TOKEN_ISSUER,
            "token carries no issuer",
        ));
    }

    match claims.aud.as_deref() {
        None => {
            return Err(StatusError::unauthorized(codes::AUTH_ERROR_AUD_MISSING, "token carries no audience"));
        }
        Some(aud) if aud != host_org_url => {
            return Err(StatusError::unauthorized(
                codes::AUTH_ERROR_AUD_INVALID,
                "token audience does not name this tenant",
            ));
        }
        Some(_) => {}
    }

    let scopes = claims
        .scope
        .as_deref()
        .map(|s| s.split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(AuthenticatedRequest { issuer: claims.iss, scopes })
}

/// Step 3: unless `scopesDisabled`, the token's scope claim must include
/// `required_scope`.
pub fn require_scope(auth: &AuthenticatedRequest, required_scope: &str, scopes_disabled: bool) -> OprResult<()> {
    if scopes_disabled || auth.scopes.iter().any(|s| s == required_scope) {
        Ok(())
    } else {
        Err(StatusError::forbidden(
            codes::AUTH_ERROR_MISSING_SCOPE,
            format!("token lacks required scope '{required_scope}'"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn missing_header_fails_no_auth_header() {
        let err = extract_bearer(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.code, codes::NO_AUTH_HEADER);
    }

    #[test]
    fn missing_bearer_prefix_fails() {
        let err = extract_bearer(&headers_with("Token abc")).unwrap_err();
        assert_eq!(err.code, codes::AUTH_HEADER_NO_BEARER_PREFIX);
    }

    #[test]
    fn empty_token_fails() {
        let err = extract_bearer(&headers_with("Bearer ")).unwrap_err();
        assert_eq!(err.code, codes::AUTH_HEADER_EMPTY_TOKEN);
    }

    #[test]
    fn well_formed_header_extracts_token() {
        assert_eq!(extract_bearer(&headers_with("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn require_scope_passes_when_disabled_even_without_scope() {
        let auth = AuthenticatedRequest { issuer: "https://a.example/org.json".into(), scopes: vec![] };
        require_scope(&auth, "LISTPRODUCTS", true).unwrap();
    }

    #[test]
    fn require_scope_fails_missing_scope() {
        let auth = AuthenticatedRequest { issuer: "https://a.example/org.json".into(), scopes: vec!["ACCEPTPRODUCT".into()] };
        let err = require_scope(&auth, "LISTPRODUCTS", false).unwrap_err();
        assert_eq!(err.code, codes::AUTH_ERROR_MISSING_SCOPE);
    }
}
