//! Structured offer identifiers and their URL-form serialization.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OprResult, StatusError};

/// The pair `(postingOrgUrl, id)` that uniquely names an offer network-wide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredOfferId {
    pub posting_org_url: String,
    pub id: String,
}

impl StructuredOfferId {
    pub fn new(posting_org_url: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            posting_org_url: posting_org_url.into(),
            id: id.into(),
        }
    }

    /// The `offeredBy#id` key used to index a canonicalized offer set.
    pub fn full_offer_id(&self) -> String {
        format!("{}#{}", self.posting_org_url, self.id)
    }
}

/// A [`StructuredOfferId`] additionally carrying the version it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedStructuredOfferId {
    pub posting_org_url: String,
    pub id: String,
    pub last_update_time_utc: i64,
}

impl VersionedStructuredOfferId {
    pub fn new(
        posting_org_url: impl Into<String>,
        id: impl Into<String>,
        last_update_time_utc: i64,
    ) -> Self {
        Self {
            posting_org_url: posting_org_url.into(),
            id: id.into(),
            last_update_time_utc,
        }
    }

    pub fn unversioned(&self) -> StructuredOfferId {
        StructuredOfferId::new(self.posting_org_url.clone(), self.id.clone())
    }
}

impl fmt::Display for StructuredOfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.posting_org_url, self.id)
    }
}

impl fmt::Display for VersionedStructuredOfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}&{}",
            self.posting_org_url, self.id, self.last_update_time_utc
        )
    }
}

/// Parse the URL-form `postingOrgUrl#id[&updateTimestamp]`.
///
/// The `&`-separated update timestamp is the field at index `1` of the
/// fragment split on `&`; this parser is the exact inverse of
/// [`id_to_url`].
pub fn url_to_id(url: &str) -> OprResult<VersionedOrPlainId> {
    let (posting_org_url, fragment) = url.split_once('#').ok_or_else(|| {
        StatusError::bad_request(
            "OFFER_ID_URL_MALFORMED",
            format!("offer id url '{url}' has no '#' separator"),
        )
    })?;
    if posting_org_url.is_empty() || fragment.is_empty() {
        return Err(StatusError::bad_request(
            "OFFER_ID_URL_MALFORMED",
            format!("offer id url '{url}' has an empty org url or id"),
        ));
    }

    let mut parts = fragment.splitn(2, '&');
    let id = parts.next().unwrap_or_default().to_string();
    match parts.next() {
        Some(ts_str) => {
            let last_update_time_utc = ts_str.parse::<i64>().map_err(|_| {
                StatusError::bad_request(
                    "OFFER_ID_URL_MALFORMED",
                    format!("offer id url '{url}' has a non-numeric update timestamp"),
                )
            })?;
            Ok(VersionedOrPlainId::Versioned(VersionedStructuredOfferId {
                posting_org_url: posting_org_url.to_string(),
                id,
                last_update_time_utc,
            }))
        }
        None => Ok(VersionedOrPlainId::Plain(StructuredOfferId {
            posting_org_url: posting_org_url.to_string(),
            id,
        })),
    }
}

/// Render a [`StructuredOfferId`] or [`VersionedStructuredOfferId`] in its
/// URL form. Exact inverse of [`url_to_id`].
pub fn id_to_url(id: &VersionedOrPlainId) -> String {
    match id {
        VersionedOrPlainId::Plain(p) => p.to_string(),
        VersionedOrPlainId::Versioned(v) => v.to_string(),
    }
}

/// Either form an offer id url may parse to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedOrPlainId {
    Plain(StructuredOfferId),
    Versioned(VersionedStructuredOfferId),
}

impl VersionedOrPlainId {
    pub fn unversioned(&self) -> StructuredOfferId {
        match self {
            Self::Plain(p) => p.clone(),
            Self::Versioned(v) => v.unversioned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_id() {
        let url = "https://example.org/org.json#offer-1";
        let parsed = url_to_id(url).unwrap();
        assert_eq!(
            parsed,
            VersionedOrPlainId::Plain(StructuredOfferId::new(
                "https://example.org/org.json",
                "offer-1"
            ))
        );
        assert_eq!(id_to_url(&parsed), url);
    }

    #[test]
    fn round_trips_versioned_id() {
        let url = "https://example.org/org.json#offer-1&1700000000000";
        let parsed = url_to_id(url).unwrap();
        assert_eq!(
            parsed,
            VersionedOrPlainId::Versioned(VersionedStructuredOfferId::new(
                "https://example.org/org.json",
                "offer-1",
                1_700_000_000_000,
            ))
        );
        assert_eq!(id_to_url(&parsed), url);
    }

    #[test]
    fn rejects_url_without_fragment() {
        assert!(url_to_id("https://example.org/org.json").is_err());
    }
}
