//! Timeline entries: persisted per-viewer visibility intervals, and the
//! half-open interval arithmetic shared by the model and storage layers.

use serde::{Deserialize, Serialize};

use crate::reshare::ReshareChain;

/// Wildcard viewer: matches every org except the host itself.
pub const WILDCARD_VIEWER: &str = "*";

/// A half-open instant interval `[start, end)`, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start_utc: i64,
    pub end_utc: i64,
}

impl Interval {
    pub fn new(start_utc: i64, end_utc: i64) -> Self {
        Self { start_utc, end_utc }
    }

    pub fn contains(&self, instant: i64) -> bool {
        instant >= self.start_utc && instant < self.end_utc
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start_utc < other.end_utc && other.start_utc < self.end_utc
    }

    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let start = self.start_utc.max(other.start_utc);
        let end = self.end_utc.min(other.end_utc);
        (start < end).then_some(Interval::new(start, end))
    }

    pub fn is_empty(&self) -> bool {
        self.end_utc <= self.start_utc
    }

    /// Subtract `other` from `self`, producing zero, one, or two residual
    /// sub-intervals (used when a reservation carves a hole out of a
    /// listing).
    pub fn subtract(&self, other: &Interval) -> Vec<Interval> {
        let Some(overlap) = self.intersection(other) else {
            return vec![*self];
        };
        let mut residual = Vec::new();
        if self.start_utc < overlap.start_utc {
            residual.push(Interval::new(self.start_utc, overlap.start_utc));
        }
        if overlap.end_utc < self.end_utc {
            residual.push(Interval::new(overlap.end_utc, self.end_utc));
        }
        residual
    }
}

/// A single persisted visibility window for one `(target org, offer)` pair.
///
/// Invariant: for a given `(host, target, offerId, postingOrg)` and any
/// instant `t`, at most one entry contains `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub target_org_url: String,
    pub offer_id: String,
    pub posting_org_url: String,
    pub offer_update_utc: i64,
    pub interval: Interval,
    pub is_reservation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reshare_chain: Option<ReshareChain>,
}

impl TimelineEntry {
    /// True when `target_org_url` is the wildcard and `viewer` is not the
    /// host (the wildcard never matches the host).
    pub fn matches_viewer(&self, viewer: &str, host: &str) -> bool {
        if self.target_org_url == viewer {
            return true;
        }
        self.target_org_url == WILDCARD_VIEWER && viewer != host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtract_with_no_overlap_is_noop() {
        let a = Interval::new(0, 100);
        let b = Interval::new(200, 300);
        assert_eq!(a.subtract(&b), vec![a]);
    }

    #[test]
    fn subtract_middle_leaves_two_pieces() {
        let a = Interval::new(0, 100);
        let b = Interval::new(40, 60);
        assert_eq!(a.subtract(&b), vec![Interval::new(0, 40), Interval::new(60, 100)]);
    }

    #[test]
    fn subtract_prefix_leaves_suffix() {
        let a = Interval::new(0, 100);
        let b = Interval::new(0, 60);
        assert_eq!(a.subtract(&b), vec![Interval::new(60, 100)]);
    }

    #[test]
    fn wildcard_does_not_match_host() {
        let entry = TimelineEntry {
            target_org_url: WILDCARD_VIEWER.to_string(),
            offer_id: "o1".into(),
            posting_org_url: "https://a.example/org.json".into(),
            offer_update_utc: 0,
            interval: Interval::new(0, 100),
            is_reservation: false,
            reshare_chain: None,
        };
        assert!(!entry.matches_viewer("https://host.example/org.json", "https://host.example/org.json"));
        assert!(entry.matches_viewer("https://other.example/org.json", "https://host.example/org.json"));
    }
}
