#![forbid(unsafe_code)]

use imaging::FileId;
use std::fmt;

/// Navigation direction reported by the viewer for one slice access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
    /// Warm both sides, forward neighbors first.
    Both,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Both => "both",
        };
        f.write_str(name)
    }
}

/// One navigation event, handed to the planner as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchRequest {
    pub file: FileId,
    /// Zero-based index of the slice the viewer just displayed.
    pub current: u32,
    /// Number of slices in the volume.
    pub total: u32,
    pub direction: Direction,
}

/// Slice indices worth warming for one request, nearest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchPlan {
    pub slices: Vec<u32>,
}

impl PrefetchPlan {
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Outcome counts for one warming batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Slices fetched and written through to the cache.
    pub warmed: usize,
    /// Slices that were planned but could not be warmed.
    pub failed: usize,
}

impl PrefetchReport {
    pub fn attempted(&self) -> usize {
        self.warmed + self.failed
    }
}
