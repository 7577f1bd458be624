//! Decoding JWTs without verifying their signature - used both to read a
//! reshare chain link's claims and, as the first step of token
//! verification, to discover which org's JWKS to fetch.

use base64::Engine;
use serde::de::DeserializeOwned;

use opr_core::error::StatusError;
use opr_core::OprResult;

/// The three base64url segments of a compact JWS, unparsed.
pub struct JwtSegments<'a> {
    pub header_b64: &'a str,
    pub payload_b64: &'a str,
    pub signature_b64: &'a str,
}

pub fn split_jwt(jwt: &str) -> OprResult<JwtSegments<'_>> {
    let mut parts = jwt.splitn(3, '.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(StatusError::unauthorized(
            "AUTH_ERROR",
            "malformed JWT: expected three '.'-delimited segments",
        ));
    };
    Ok(JwtSegments {
        header_b64,
        payload_b64,
        signature_b64,
    })
}

/// Decode the payload segment into `T`, without checking the signature.
pub fn decode_payload_unsafe<T: DeserializeOwned>(jwt: &str) -> OprResult<T> {
    let segments = split_jwt(jwt)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segments.payload_b64)
        .map_err(|e| StatusError::unauthorized("AUTH_ERROR", format!("bad JWT payload base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StatusError::unauthorized("AUTH_ERROR", format!("bad JWT payload JSON: {e}")))
}

/// The raw base64url signature segment - this literal string is what
/// becomes the next link's `entitlements` claim when signing a chain.
pub fn signature_segment(jwt: &str) -> OprResult<&str> {
    Ok(split_jwt(jwt)?.signature_b64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Dummy {
        iss: String,
    }

    #[test]
    fn splits_three_segments() {
        let jwt = "aaa.bbb.ccc";
        let segs = split_jwt(jwt).unwrap();
        assert_eq!(segs.header_b64, "aaa");
        assert_eq!(segs.payload_b64, "bbb");
        assert_eq!(segs.signature_b64, "ccc");
    }

    #[test]
    fn rejects_malformed_jwt() {
        assert!(split_jwt("onlyonepart").is_err());
    }

    #[test]
    fn decodes_payload_without_verifying_signature() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(br#"{"iss":"https://a.example/org.json"}"#);
        let jwt = format!("header.{payload}.sig");
        let decoded: Dummy = decode_payload_unsafe(&jwt).unwrap();
        assert_eq!(decoded.iss, "https://a.example/org.json");
    }
}
