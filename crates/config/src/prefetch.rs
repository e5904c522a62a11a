#![forbid(unsafe_code)]

use crate::{Pacing, Priority};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on the planning window; keeps background work bounded.
pub const MAX_PREFETCH_COUNT: u32 = 64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PrefetchPolicy {
    /// Whether background slice warming runs at all.
    pub enabled: bool,

    /// How many slices ahead (and behind) of the current position to plan.
    pub count: u32,

    /// Pacing priority for background fetches.
    pub priority: Priority,

    pub pacing: Pacing,
}

impl Default for PrefetchPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 3,
            priority: Priority::Normal,
            pacing: Pacing::default(),
        }
    }
}

impl PrefetchPolicy {
    /// Normalize the window size into 1..=MAX_PREFETCH_COUNT.
    pub fn clamp(self) -> Self {
        Self {
            count: self.count.clamp(1, MAX_PREFETCH_COUNT),
            ..self
        }
    }

    /// Delay applied between consecutive background fetches.
    pub fn delay(&self) -> Duration {
        self.pacing.delay(self.priority)
    }
}
