use serde::Deserialize;

/// Tunables of an agent.
///
/// Can be deserialized from a configuration file, missing fields fall back
/// to their defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// The number of planning steps allowed to request tools. A run is
    /// aborted when the planner still requests tools after this many steps.
    pub step_limit: usize,
    /// How many times a planning request is attempted when the planner is
    /// rate limited.
    pub max_planner_attempts: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            step_limit: 7,
            max_planner_attempts: 3,
        }
    }
}
