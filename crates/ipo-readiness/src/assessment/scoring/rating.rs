use std::fmt;

use serde::{Deserialize, Serialize};

pub const IPO_READY_THRESHOLD: f64 = 65.0;
pub const NEEDS_IMPROVEMENT_THRESHOLD: f64 = 45.0;

/// Coarse readiness bucket derived from the percentage score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    IpoReady,
    NeedsImprovement,
    NotReady,
}

impl Rating {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= IPO_READY_THRESHOLD {
            Rating::IpoReady
        } else if percentage >= NEEDS_IMPROVEMENT_THRESHOLD {
            Rating::NeedsImprovement
        } else {
            Rating::NotReady
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Rating::IpoReady => "IPO ready",
            Rating::NeedsImprovement => "needs improvement",
            Rating::NotReady => "not ready",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
