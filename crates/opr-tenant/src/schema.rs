//! Strict-correctness-mode response validation: when a tenant opts in
//! via `strictCorrectnessMode`, every outgoing response is
//! checked against its JSON Schema before it leaves this node. A mismatch
//! means this node built a malformed response, so it surfaces as a 500
//! rather than anything the caller did wrong.

use std::sync::OnceLock;

use jsonschema::Validator;
use serde::Serialize;

use opr_core::StatusError;

use crate::error::TenantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    ListOffers,
    Accept,
    Reject,
    Reserve,
    History,
}

fn list_offers_schema() -> &'static Validator {
    static V: OnceLock<Validator> = OnceLock::new();
    V.get_or_init(|| {
        jsonschema::validator_for(&serde_json::json!({
            "type": "object",
            "required": ["responseFormat", "resultsTimestampUTC", "offers"],
            "properties": {
                "responseFormat": {"enum": ["SNAPSHOT", "DIFF"]},
                "resultsTimestampUTC": {"type": "integer"},
                "offers": {"type": "array"}
            }
        }))
        .expect("list offers response schema is valid")
    })
}

fn offer_envelope_schema() -> &'static Validator {
    static V: OnceLock<Validator> = OnceLock::new();
    V.get_or_init(|| {
        jsonschema::validator_for(&serde_json::json!({
            "type": "object",
            "required": ["offer"],
            "properties": {
                "offer": {
                    "type": "object",
                    "required": ["id", "offeredBy"]
                }
            }
        }))
        .expect("offer envelope schema is valid")
    })
}

fn reserve_schema() -> &'static Validator {
    static V: OnceLock<Validator> = OnceLock::new();
    V.get_or_init(|| {
        jsonschema::validator_for(&serde_json::json!({
            "type": "object",
            "required": ["offer", "reservationExpirationUTC"],
            "properties": {
                "offer": {
                    "type": "object",
                    "required": ["id", "offeredBy"]
                },
                "reservationExpirationUTC": {"type": "integer"}
            }
        }))
        .expect("reserve response schema is valid")
    })
}

fn history_schema() -> &'static Validator {
    static V: OnceLock<Validator> = OnceLock::new();
    V.get_or_init(|| {
        jsonschema::validator_for(&serde_json::json!({
            "type": "object",
            "required": ["offerHistories"],
            "properties": {
                "offerHistories": {"type": "array"}
            }
        }))
        .expect("history response schema is valid")
    })
}

fn validator_for(kind: ResponseKind) -> &'static Validator {
    match kind {
        ResponseKind::ListOffers => list_offers_schema(),
        ResponseKind::Accept | ResponseKind::Reject => offer_envelope_schema(),
        ResponseKind::Reserve => reserve_schema(),
        ResponseKind::History => history_schema(),
    }
}

pub fn validate_response<T: Serialize>(kind: ResponseKind, value: &T) -> Result<(), TenantError> {
    let instance = serde_json::to_value(value).map_err(|e| {
        TenantError(StatusError::internal(
            "INTERNAL_ERROR_MALFORMED_RESPONSE",
            format!("response did not serialize: {e}"),
        ))
    })?;

    let validator = validator_for(kind);
    if validator.is_valid(&instance) {
        return Ok(());
    }

    let detail: Vec<String> = validator.iter_errors(&instance).map(|e| e.to_string()).collect();
    Err(TenantError(
        StatusError::internal(
            "INTERNAL_ERROR_MALFORMED_RESPONSE",
            "outgoing response failed schema validation",
        )
        .with_extra("validationErrors", serde_json::json!(detail)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opr_model::ListOffersResponse;
    use opr_model::{ListResults, ResponseFormat};

    #[test]
    fn well_formed_list_response_validates() {
        let response = ListOffersResponse {
            response_format: ResponseFormat::Snapshot,
            results_timestamp_utc: 0,
            offers: ListResults::Snapshot(vec![]),
            next_page_token: None,
        };
        validate_response(ResponseKind::ListOffers, &response).unwrap();
    }
}
