#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Pacing knob for background slice warming.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}
