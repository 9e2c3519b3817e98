//! The resolved caller identity, carried in request-scoped context and
//! never mutated after authentication.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    SignedHeader,
    Jwt,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub tier: Option<String>,
    pub features: Vec<String>,
    pub job_id: Option<String>,
    pub source: IdentitySource,
}

impl Identity {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Strips a plan-encoded tier's scope marker (`u:` user-scope, `o:`
/// org-scope) if present.
pub fn strip_tier_prefix(tier: &str) -> &str {
    tier.strip_prefix("u:")
        .or_else(|| tier.strip_prefix("o:"))
        .unwrap_or(tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_user_scope_prefix() {
        assert_eq!(strip_tier_prefix("u:pro"), "pro");
    }

    #[test]
    fn strips_org_scope_prefix() {
        assert_eq!(strip_tier_prefix("o:enterprise"), "enterprise");
    }

    #[test]
    fn passes_through_unprefixed_tier() {
        assert_eq!(strip_tier_prefix("pro"), "pro");
    }

    #[test]
    fn has_feature_matches_exact_name() {
        let identity = Identity {
            user_id: "u1".to_string(),
            email: None,
            tier: None,
            features: vec!["solver.turnstile".to_string()],
            job_id: None,
            source: IdentitySource::Jwt,
        };
        assert!(identity.has_feature("solver.turnstile"));
        assert!(!identity.has_feature("solver.hcaptcha"));
    }
}
