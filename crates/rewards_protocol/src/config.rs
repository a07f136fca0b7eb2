//! Engine-level configuration shared between the core crate and the worker binary.

use std::time::Duration;

/// Parameters the reward engine and validator need, independent of where a
/// given unit's files live.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The sliding reward window, W.
    pub reward_window: Duration,
    /// Value attributed to an `event` record lacking `properties.value`.
    pub default_event_value: f64,
    /// Reward-key bucket used when a decision or rewards record doesn't name one.
    pub default_reward_key: String,
}

impl EngineConfig {
    pub fn new(reward_window: Duration, default_event_value: f64) -> Self {
        Self {
            reward_window,
            default_event_value,
            default_reward_key: crate::record::DEFAULT_REWARD_KEY.to_string(),
        }
    }
}
