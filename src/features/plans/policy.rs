use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subscription tiers, most restrictive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Starter,
    Pro,
}

/// Upload limits attached to a subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlanRule {
    /// Cumulative storage ceiling in bytes
    pub max_bytes: i64,
    /// Maximum files per upload batch, which doubles as the
    /// simultaneous-transfer cap
    pub max_concurrent_uploads: usize,
}

const FREE_RULE: PlanRule = PlanRule {
    max_bytes: 500 * 1024 * 1024,
    max_concurrent_uploads: 3,
};

const STARTER_RULE: PlanRule = PlanRule {
    max_bytes: 5 * 1024 * 1024 * 1024,
    max_concurrent_uploads: 10,
};

const PRO_RULE: PlanRule = PlanRule {
    max_bytes: 20 * 1024 * 1024 * 1024,
    max_concurrent_uploads: 25,
};

impl Plan {
    /// Parse a stored plan name. Anything unrecognized falls back to the most
    /// restrictive tier.
    pub fn from_name(name: &str) -> Self {
        match name {
            "starter" => Plan::Starter,
            "pro" => Plan::Pro,
            _ => Plan::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Pro => "pro",
        }
    }

    pub fn limits(&self) -> &'static PlanRule {
        match self {
            Plan::Free => &FREE_RULE,
            Plan::Starter => &STARTER_RULE,
            Plan::Pro => &PRO_RULE,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_round_trip() {
        for plan in [Plan::Free, Plan::Starter, Plan::Pro] {
            assert_eq!(Plan::from_name(plan.as_str()), plan);
        }
    }

    #[test]
    fn unknown_names_fall_back_to_free() {
        assert_eq!(Plan::from_name(""), Plan::Free);
        assert_eq!(Plan::from_name("enterprise"), Plan::Free);
        assert_eq!(Plan::from_name("PRO"), Plan::Free);
    }

    #[test]
    fn tiers_are_strictly_ordered() {
        let free = Plan::Free.limits();
        let starter = Plan::Starter.limits();
        let pro = Plan::Pro.limits();
        assert!(free.max_bytes < starter.max_bytes);
        assert!(starter.max_bytes < pro.max_bytes);
        assert!(free.max_concurrent_uploads < starter.max_concurrent_uploads);
        assert!(starter.max_concurrent_uploads < pro.max_concurrent_uploads);
    }
}
