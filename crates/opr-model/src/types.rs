//! Wire payload and response shapes for the five model operations.

use serde::{Deserialize, Serialize};

use opr_core::reshare::ReshareChain;
use opr_core::Offer;
use opr_diff::OfferPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseFormat {
    Snapshot,
    Diff,
}

/// Opaque paging cursor threaded back to the caller between `list`/
/// `getHistory` calls. Carries either a snapshot instant or a diff
/// watermark, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageToken {
    pub max_results_per_page: usize,
    pub skip_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_time_utc: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_since_utc: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_format: Option<ResponseFormat>,
}

fn default_page_size() -> usize {
    100
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOffersPayload {
    #[serde(default)]
    pub requested_result_format: Option<ResponseFormat>,
    #[serde(default)]
    pub diff_start_timestamp_utc: Option<i64>,
    #[serde(default = "default_page_size")]
    pub max_results_per_page: usize,
    #[serde(default)]
    pub page_token: Option<PageToken>,
}

/// Either a page of full offers (SNAPSHOT) or a page of per-offer patches,
/// optionally preceded by a literal `"clear"` (DIFF).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListResults {
    Snapshot(Vec<Offer>),
    Diff(Vec<OfferPatch>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOffersResponse {
    pub response_format: ResponseFormat,
    #[serde(rename = "resultsTimestampUTC")]
    pub results_timestamp_utc: i64,
    pub offers: ListResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<PageToken>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptPayload {
    pub offer_id: String,
    #[serde(default)]
    pub if_not_newer_than_timestamp_utc: Option<i64>,
    #[serde(default)]
    pub reshare_chain: Option<ReshareChain>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    pub offer: Offer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectPayload {
    pub offer_id: String,
    #[serde(default)]
    pub offered_by_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectResponse {
    pub offer: Offer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservePayload {
    pub offer_id: String,
    #[serde(default)]
    pub requested_reservation_secs: Option<i64>,
    #[serde(default)]
    pub reshare_chain: Option<ReshareChain>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    pub offer: Offer,
    pub reservation_expiration_utc: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPayload {
    #[serde(default)]
    pub history_since_utc: Option<i64>,
    #[serde(default = "default_page_size")]
    pub max_results_per_page: usize,
    #[serde(default)]
    pub page_token: Option<PageToken>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferHistoryEntry {
    pub offer_id: String,
    pub posting_org_url: String,
    pub last_update_utc: i64,
    pub accepted_by: String,
    pub accepted_at_utc: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub offer_histories: Vec<OfferHistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<PageToken>,
}
