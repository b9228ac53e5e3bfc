//! API key authentication and per-tier rate limiting.

pub mod keys;
pub mod rate_limit;

pub use keys::{generate_api_key, hash_api_key, ApiKeyStore, ClientInfo};
pub use rate_limit::{RateLimitDecision, RateLimiter};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription tier of an API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Starter,
    Growth,
    Enterprise,
}

/// Request quotas for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_month: u32,
}

impl Tier {
    pub fn limits(&self) -> TierLimits {
        match self {
            Tier::Free => TierLimits {
                per_minute: 10,
                per_hour: 50,
                per_month: 50,
            },
            Tier::Starter => TierLimits {
                per_minute: 30,
                per_hour: 200,
                per_month: 500,
            },
            Tier::Growth => TierLimits {
                per_minute: 100,
                per_hour: 1000,
                per_month: 5000,
            },
            Tier::Enterprise => TierLimits {
                per_minute: 500,
                per_hour: 5000,
                per_month: 100_000,
            },
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Free => write!(f, "free"),
            Tier::Starter => write!(f, "starter"),
            Tier::Growth => write!(f, "growth"),
            Tier::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "starter" => Ok(Tier::Starter),
            "growth" => Ok(Tier::Growth),
            "enterprise" => Ok(Tier::Enterprise),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_limits() {
        assert_eq!(Tier::Free.limits().per_month, 50);
        assert_eq!(Tier::Starter.limits().per_minute, 30);
        assert_eq!(Tier::Growth.limits().per_hour, 1000);
        assert_eq!(Tier::Enterprise.limits().per_month, 100_000);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("Growth".parse::<Tier>(), Ok(Tier::Growth));
        assert!("platinum".parse::<Tier>().is_err());
        assert_eq!(Tier::Starter.to_string(), "starter");
    }
}
