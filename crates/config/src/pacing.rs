#![forbid(unsafe_code)]

use crate::Priority;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

/// Inter-fetch delays keyed by priority, in milliseconds on the wire.
#[serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Pacing {
    /// Delay between consecutive background fetches at low priority.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub low: Duration,

    /// Delay between consecutive background fetches at normal priority.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub normal: Duration,

    /// Delay between consecutive background fetches at high priority.
    #[serde_as(as = "serde_with::DurationMilliSeconds")]
    pub high: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            low: Duration::from_millis(500),
            normal: Duration::from_millis(200),
            high: Duration::from_millis(50),
        }
    }
}

impl Pacing {
    pub fn delay(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Low => self.low,
            Priority::Normal => self.normal,
            Priority::High => self.high,
        }
    }
}
