//! The hierarchical policy: a forest of time-sliced nodes, each handing
//! its listed orgs an exclusive window before handing off to its children.

use std::collections::HashSet;

use opr_core::reshare::Scope;
use opr_core::{Offer, OprResult};

use crate::listing::{Listing, ListingPolicy};

/// One node of the hierarchy: a set of orgs that get first look for
/// `exclusive_time`, a total visibility window of `total_time`, and
/// optional children that inherit the remaining time after the
/// exclusive window closes.
#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub exclusive_time: i64,
    pub total_time: i64,
    pub listed_orgs: Vec<String>,
    pub child_hierarchies: Vec<HierarchyNode>,
}

/// A forest of [`HierarchyNode`]s evaluated left to right, each sibling
/// starting `exclusive_time` after the previous one.
pub struct HierarchicalPolicy {
    pub forest: Vec<HierarchyNode>,
}

impl HierarchicalPolicy {
    pub fn new(forest: Vec<HierarchyNode>) -> Self {
        Self { forest }
    }
}

fn visit(
    nodes: &[HierarchyNode],
    base_time: i64,
    rejections: &HashSet<String>,
    shared_by: &HashSet<String>,
    out: &mut Vec<Listing>,
) {
    let mut starts_at = base_time;
    for node in nodes {
        for org in &node.listed_orgs {
            if !rejections.contains(org) && !shared_by.contains(org) {
                out.push(Listing {
                    org_url: org.clone(),
                    start_time_utc: starts_at,
                    end_time_utc: starts_at + node.total_time,
                    scopes: vec![Scope::Accept],
                });
            }
        }
        visit(
            &node.child_hierarchies,
            starts_at + node.exclusive_time,
            rejections,
            shared_by,
            out,
        );
        starts_at += node.exclusive_time;
    }
}

#[async_trait::async_trait]
impl ListingPolicy for HierarchicalPolicy {
    async fn get_listings(
        &self,
        _offer: &Offer,
        first_listing_time_utc: i64,
        _current_time_utc: i64,
        rejections: &HashSet<String>,
        shared_by: &HashSet<String>,
    ) -> OprResult<Vec<Listing>> {
        let mut out = Vec::new();
        visit(&self.forest, first_listing_time_utc, rejections, shared_by, &mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer() -> Offer {
        serde_json::from_value(serde_json::json!({
            "id": "o1",
            "offeredBy": "https://a.example/org.json",
            "offerCreationUTC": 0,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn siblings_start_after_prior_exclusive_window() {
        let forest = vec![
            HierarchyNode {
                exclusive_time: 100,
                total_time: 500,
                listed_orgs: vec!["https://a.example/org.json".into()],
                child_hierarchies: vec![],
            },
            HierarchyNode {
                exclusive_time: 100,
                total_time: 500,
                listed_orgs: vec!["https://b.example/org.json".into()],
                child_hierarchies: vec![],
            },
        ];
        let policy = HierarchicalPolicy::new(forest);
        let listings = policy
            .get_listings(&offer(), 1000, 0, &HashSet::new(), &HashSet::new())
            .await
            .unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].org_url, "https://a.example/org.json");
        assert_eq!(listings[0].start_time_utc, 1000);
        assert_eq!(listings[1].org_url, "https://b.example/org.json");
        assert_eq!(listings[1].start_time_utc, 1100);
    }

    #[tokio::test]
    async fn children_recurse_with_base_time_advanced_by_exclusive_time() {
        let forest = vec![HierarchyNode {
            exclusive_time: 50,
            total_time: 200,
            listed_orgs: vec!["https://parent.example/org.json".into()],
            child_hierarchies: vec![HierarchyNode {
                exclusive_time: 50,
                total_time: 100,
                listed_orgs: vec!["https://child.example/org.json".into()],
                child_hierarchies: vec![],
            }],
        }];
        let policy = HierarchicalPolicy::new(forest);
        let listings = policy
            .get_listings(&offer(), 0, 0, &HashSet::new(), &HashSet::new())
            .await
            .unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].org_url, "https://parent.example/org.json");
        assert_eq!(listings[0].start_time_utc, 0);
        assert_eq!(listings[1].org_url, "https://child.example/org.json");
        assert_eq!(listings[1].start_time_utc, 50);
    }

    #[tokio::test]
    async fn rejecting_orgs_are_excluded() {
        let forest = vec![HierarchyNode {
            exclusive_time: 50,
            total_time: 200,
            listed_orgs: vec!["https://a.example/org.json".into()],
            child_hierarchies: vec![],
        }];
        let policy = HierarchicalPolicy::new(forest);
        let rejections = HashSet::from(["https://a.example/org.json".to_string()]);
        let listings = policy
            .get_listings(&offer(), 0, 0, &rejections, &HashSet::new())
            .await
            .unwrap();
        assert!(listings.is_empty());
    }
}
