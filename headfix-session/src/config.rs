use serde::{Deserialize, Serialize};

/// Bounds on the planner's rejection sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    /// Candidate arrays drawn before giving up with `ConfigInfeasible`.
    pub max_attempts: u32,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            max_attempts: 100_000,
        }
    }
}
