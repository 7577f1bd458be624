//! Access control lists: per-tenant, decides whether a peer org is
//! allowed to call a handler that doesn't otherwise carry its own
//! authorization (a reshare chain, or the history handler's blanket
//! exemption).

use std::collections::HashSet;

use async_trait::async_trait;

#[async_trait]
pub trait AccessControlList: Send + Sync {
    async fn is_allowed(&self, org_url: &str) -> bool;
}

/// Allows exactly the orgs named at construction time.
pub struct AllowListAcl {
    allowed: HashSet<String>,
}

impl AllowListAcl {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self { allowed: allowed.into_iter().collect() }
    }
}

#[async_trait]
impl AccessControlList for AllowListAcl {
    async fn is_allowed(&self, org_url: &str) -> bool {
        self.allowed.contains(org_url)
    }
}

/// Allows every org - for tenants that gate visibility entirely through
/// their listing policy rather than a federation-wide ACL.
pub struct AllowAllAcl;

#[async_trait]
impl AccessControlList for AllowAllAcl {
    async fn is_allowed(&self, _org_url: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_list_rejects_unknown_org() {
        let acl = AllowListAcl::new(vec!["https://a.example/org.json".to_string()]);
        assert!(acl.is_allowed("https://a.example/org.json").await);
        assert!(!acl.is_allowed("https://b.example/org.json").await);
    }

    #[tokio::test]
    async fn allow_all_accepts_everyone() {
        assert!(AllowAllAcl.is_allowed("https://anyone.example/org.json").await);
    }
}
