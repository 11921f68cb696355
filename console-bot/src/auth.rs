//! Risk-operator allow-list for irreversible commands.

use std::collections::HashSet;

/// Identities allowed to confirm bulk deletion.
///
/// An empty list lets everyone through. Otherwise the identity must be
/// listed verbatim.
#[derive(Debug, Clone, Default)]
pub struct RiskOperators {
    allowed: HashSet<String>,
}

impl RiskOperators {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: identities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_authorized(&self, identity: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_open() {
        let ops = RiskOperators::default();
        assert!(ops.is_authorized("anyone"));
        assert!(ops.is_authorized(""));
    }

    #[test]
    fn test_membership_required() {
        let ops = RiskOperators::new(["10001", "10002"]);
        assert!(ops.is_authorized("10001"));
        assert!(!ops.is_authorized("10003"));
        assert!(!ops.is_authorized("1000"));
    }

    #[test]
    fn test_star_is_not_a_wildcard() {
        let ops = RiskOperators::new(vec!["*".to_string()]);
        assert!(!ops.is_authorized("10001"));
        assert!(ops.is_authorized("*"));
    }
}
