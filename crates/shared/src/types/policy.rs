//! Spend policy toggle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Controls which budget statuses accept expenditures and fund commitments.
///
/// Line availability is always enforced; this only adds a status gate on top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPolicy {
    /// Spending is accepted whatever the budget status, including Closed.
    #[default]
    AnyStatus,
    /// Spending is accepted only while the budget is Active.
    ActiveOnly,
}

impl SpendPolicy {
    /// Returns the string representation of the policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnyStatus => "any_status",
            Self::ActiveOnly => "active_only",
        }
    }

    /// Parses a policy from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "any_status" => Some(Self::AnyStatus),
            "active_only" => Some(Self::ActiveOnly),
            _ => None,
        }
    }
}

impl fmt::Display for SpendPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
