//! Wire and decoded forms of the reshare chain: an ordered sequence of
//! chained JWTs that delegate acceptance/reshare rights across hops.

use serde::{Deserialize, Serialize};

/// A scope a reshare chain link may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Accept,
    Reshare,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Accept => "ACCEPT",
            Scope::Reshare => "RESHARE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCEPT" => Some(Scope::Accept),
            "RESHARE" => Some(Scope::Reshare),
            _ => None,
        }
    }
}

/// Parse a space-separated `scope` claim into the subset of [`Scope`] it
/// names. Unknown tokens are ignored rather than rejected, matching how the
/// rest of the network tolerates scopes it doesn't recognize yet.
pub fn parse_scopes(scope_claim: &str) -> Vec<Scope> {
    scope_claim
        .split(' ')
        .filter(|s| !s.is_empty())
        .filter_map(Scope::parse)
        .collect()
}

pub fn render_scopes(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The wire form of a reshare chain: an ordered array of compact JWS
/// strings, each `base64url(header).base64url(payload).base64url(signature)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReshareChain(pub Vec<String>);

impl ReshareChain {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn last_jwt(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn appended(&self, jwt: String) -> Self {
        let mut next = self.0.clone();
        next.push(jwt);
        Self(next)
    }
}

/// One decoded (not necessarily verified) link of a reshare chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLink {
    pub sharing_org_url: String,
    pub recipient_org_url: String,
    pub entitlements: String,
    /// The raw base64url signature segment, i.e. the third `.`-delimited
    /// part of the compact JWS.
    pub signature: String,
    pub scopes: Vec<Scope>,
}

/// A fully decoded reshare chain, in hop order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedReshareChain(pub Vec<DecodedLink>);

impl DecodedReshareChain {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&DecodedLink> {
        self.0.last()
    }

    /// Every distinct `iss` across the chain's links - the set of orgs
    /// that must be allowed to view an acceptance authorized by this chain.
    pub fn issuers(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for link in &self.0 {
            if !seen.contains(&link.sharing_org_url) {
                seen.push(link.sharing_org_url.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_separated_scopes() {
        assert_eq!(
            parse_scopes("ACCEPT RESHARE"),
            vec![Scope::Accept, Scope::Reshare]
        );
    }

    #[test]
    fn ignores_unknown_scope_tokens() {
        assert_eq!(parse_scopes("ACCEPT FUTURE_SCOPE"), vec![Scope::Accept]);
    }

    #[test]
    fn render_round_trips() {
        let scopes = vec![Scope::Reshare, Scope::Accept];
        assert_eq!(render_scopes(&scopes), "RESHARE ACCEPT");
        assert_eq!(parse_scopes(&render_scopes(&scopes)), scopes);
    }
}
