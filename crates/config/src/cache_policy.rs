#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CachePolicy {
    /// Lifetime of rendered slice entries.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub slice_ttl: Duration,

    /// Lifetime of volume metadata entries.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub metadata_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            slice_ttl: Duration::from_secs(300),
            metadata_ttl: Duration::from_secs(3600),
        }
    }
}
