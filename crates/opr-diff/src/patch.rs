//! Per-offer patches and the classified result of applying one.

use json_patch::{Patch, PatchOperation};
use serde::{Deserialize, Deserializer, Serialize};

use opr_core::error::codes;
use opr_core::ids::VersionedOrPlainId;
use opr_core::{Offer, OprResult, StatusError};

/// A single update to one offer: either a literal clear of every offer
/// from a source, or a JSON-Patch against one specific offer.
#[derive(Debug, Clone)]
pub enum OfferPatch {
    Clear,
    Patch { target: VersionedOrPlainId, patch: Patch },
}

impl Serialize for OfferPatch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OfferPatch::Clear => serializer.serialize_str("clear"),
            OfferPatch::Patch { target, patch } => {
                use serde::ser::SerializeStruct;
                let mut s = serializer.serialize_struct("OfferPatch", 2)?;
                s.serialize_field("target", &opr_core::id_to_url(target))?;
                s.serialize_field("patch", patch)?;
                s.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for OfferPatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Clear(String),
            Patch { target: String, patch: Patch },
        }

        match Raw::deserialize(deserializer)? {
            Raw::Clear(s) if s == "clear" => Ok(OfferPatch::Clear),
            Raw::Clear(other) => Err(serde::de::Error::custom(format!(
                "expected the literal string \"clear\", got \"{other}\""
            ))),
            Raw::Patch { target, patch } => {
                let target = opr_core::url_to_id(&target).map_err(serde::de::Error::custom)?;
                Ok(OfferPatch::Patch { target, patch })
            }
        }
    }
}

/// The classified outcome of applying an [`OfferPatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Clear,
    Insert,
    Update,
    Delete,
    Noop,
    Error(String),
}

fn patch_path(op: &PatchOperation) -> &str {
    match op {
        PatchOperation::Add(o) => o.path.as_str(),
        PatchOperation::Remove(o) => o.path.as_str(),
        PatchOperation::Replace(o) => o.path.as_str(),
        PatchOperation::Move(o) => o.path.as_str(),
        PatchOperation::Copy(o) => o.path.as_str(),
        PatchOperation::Test(o) => o.path.as_str(),
    }
}

/// Whether every operation in `patch` targets the document root - the one
/// case an *unversioned* [`opr_core::StructuredOfferId`] may be used for.
pub fn touches_only_root(patch: &Patch) -> bool {
    patch.0.iter().all(|op| patch_path(op).is_empty())
}

fn is_root_remove(patch: &Patch) -> bool {
    matches!(
        patch.0.as_slice(),
        [PatchOperation::Remove(op)] if op.path.as_str().is_empty()
    )
}

/// Validate that `target` is versioned whenever `patch` touches a path
/// other than root.
pub fn validate_target(target: &VersionedOrPlainId, patch: &Patch) -> OprResult<()> {
    if !touches_only_root(patch) && matches!(target, VersionedOrPlainId::Plain(_)) {
        return Err(StatusError::bad_request(
            codes::OFFER_PATCH_REQUIRES_VERSIONED_ID,
            "a patch touching a path other than root must reference a versioned offer id",
        ));
    }
    Ok(())
}

/// Apply `offer_patch` against `old_offer` (the offer currently on file
/// for the patch's target, if any), returning the classified outcome and
/// the resulting offer (when one survives).
pub fn apply_offer_patch(
    offer_patch: &OfferPatch,
    old_offer: Option<&Offer>,
) -> (PatchOutcome, Option<Offer>) {
    let (target, patch) = match offer_patch {
        OfferPatch::Clear => return (PatchOutcome::Clear, None),
        OfferPatch::Patch { target, patch } => (target, patch),
    };

    if let Err(e) = validate_target(target, patch) {
        return (PatchOutcome::Error(e.message), None);
    }

    if old_offer.is_none() && is_root_remove(patch) {
        return (PatchOutcome::Noop, None);
    }

    let mut value = match old_offer {
        Some(offer) => serde_json::to_value(offer).expect("Offer always serializes"),
        None => serde_json::Value::Null,
    };

    if let Err(e) = json_patch::patch(&mut value, patch) {
        return (PatchOutcome::Error(format!("patch apply failed: {e}")), None);
    }

    if value.is_null() {
        return match old_offer {
            Some(_) => (PatchOutcome::Delete, None),
            None => (PatchOutcome::Noop, None),
        };
    }

    match serde_json::from_value::<Offer>(value) {
        Ok(new_offer) => match old_offer {
            None => (PatchOutcome::Insert, Some(new_offer)),
            Some(old) if old == &new_offer => (PatchOutcome::Noop, Some(new_offer)),
            Some(_) => (PatchOutcome::Update, Some(new_offer)),
        },
        Err(e) => (PatchOutcome::Error(e.to_string()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opr_core::ids::StructuredOfferId;
    use serde_json::json;

    fn offer(id: &str, posting_org: &str, creation: i64) -> Offer {
        serde_json::from_value(json!({
            "id": id,
            "offeredBy": posting_org,
            "offerCreationUTC": creation,
        }))
        .unwrap()
    }

    fn root_replace_patch(value: serde_json::Value) -> Patch {
        serde_json::from_value(json!([{"op": "replace", "path": "", "value": value}])).unwrap()
    }

    #[test]
    fn clear_is_classified_as_clear() {
        let (outcome, result) = apply_offer_patch(&OfferPatch::Clear, None);
        assert_eq!(outcome, PatchOutcome::Clear);
        assert!(result.is_none());
    }

    #[test]
    fn root_replace_on_absent_offer_is_insert() {
        let new = offer("o1", "https://a.example/org.json", 1);
        let patch = root_replace_patch(serde_json::to_value(&new).unwrap());
        let offer_patch = OfferPatch::Patch {
            target: VersionedOrPlainId::Plain(StructuredOfferId::new(
                "https://a.example/org.json",
                "o1",
            )),
            patch,
        };
        let (outcome, result) = apply_offer_patch(&offer_patch, None);
        assert_eq!(outcome, PatchOutcome::Insert);
        assert_eq!(result, Some(new));
    }

    #[test]
    fn root_remove_on_present_offer_is_delete() {
        let old = offer("o1", "https://a.example/org.json", 1);
        let patch: Patch = serde_json::from_value(json!([{"op": "remove", "path": ""}])).unwrap();
        let offer_patch = OfferPatch::Patch {
            target: VersionedOrPlainId::Plain(StructuredOfferId::new(
                "https://a.example/org.json",
                "o1",
            )),
            patch,
        };
        let (outcome, result) = apply_offer_patch(&offer_patch, Some(&old));
        assert_eq!(outcome, PatchOutcome::Delete);
        assert!(result.is_none());
    }

    #[test]
    fn root_remove_on_absent_offer_is_noop() {
        let patch: Patch = serde_json::from_value(json!([{"op": "remove", "path": ""}])).unwrap();
        let offer_patch = OfferPatch::Patch {
            target: VersionedOrPlainId::Plain(StructuredOfferId::new(
                "https://a.example/org.json",
                "o1",
            )),
            patch,
        };
        let (outcome, result) = apply_offer_patch(&offer_patch, None);
        assert_eq!(outcome, PatchOutcome::Noop);
        assert!(result.is_none());
    }

    #[test]
    fn unchanged_patch_is_noop() {
        let old = offer("o1", "https://a.example/org.json", 1);
        let patch = root_replace_patch(serde_json::to_value(&old).unwrap());
        let offer_patch = OfferPatch::Patch {
            target: VersionedOrPlainId::Plain(StructuredOfferId::new(
                "https://a.example/org.json",
                "o1",
            )),
            patch,
        };
        let (outcome, _) = apply_offer_patch(&offer_patch, Some(&old));
        assert_eq!(outcome, PatchOutcome::Noop);
    }

    #[test]
    fn non_root_patch_on_unversioned_target_is_rejected() {
        let old = offer("o1", "https://a.example/org.json", 1);
        let patch: Patch = serde_json::from_value(
            json!([{"op": "replace", "path": "/offerExpirationUTC", "value": 500}]),
        )
        .unwrap();
        let offer_patch = OfferPatch::Patch {
            target: VersionedOrPlainId::Plain(StructuredOfferId::new(
                "https://a.example/org.json",
                "o1",
            )),
            patch,
        };
        let (outcome, _) = apply_offer_patch(&offer_patch, Some(&old));
        assert!(matches!(outcome, PatchOutcome::Error(_)));
    }
}
