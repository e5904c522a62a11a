#![forbid(unsafe_code)]

use crate::plan::{Direction, PrefetchPlan, PrefetchRequest};
use tracing::trace;

/// Decides which slices are worth warming for a navigation event.
///
/// Implementations must be pure: same request, same plan, no I/O. The
/// executor owns every effectful concern (cache probes, fetching, pacing),
/// so planners stay trivially testable.
pub trait PrefetchPlanner: Send + Sync {
    fn plan(&self, request: &PrefetchRequest) -> PrefetchPlan;
}

/// Plans the nearest neighbors of the current slice in the direction of
/// travel, clipped to the volume bounds.
///
/// Candidates are ordered nearest first so that when warming is cut short
/// the slices most likely to be asked for next are already cached.
#[derive(Debug, Clone)]
pub struct NeighborPlanner {
    count: u32,
}

impl NeighborPlanner {
    pub fn new(count: u32) -> Self {
        Self {
            count: count.max(1),
        }
    }

    fn ahead(&self, current: u32, total: u32) -> impl Iterator<Item = u32> {
        (1..=self.count)
            .map(move |offset| current.saturating_add(offset))
            .take_while(move |&index| index < total)
    }

    fn behind(&self, current: u32) -> impl Iterator<Item = u32> {
        (1..=self.count).map_while(move |offset| current.checked_sub(offset))
    }
}

impl PrefetchPlanner for NeighborPlanner {
    fn plan(&self, request: &PrefetchRequest) -> PrefetchPlan {
        // A position at or past the end of the volume has no neighbors
        // worth planning; this also covers empty volumes.
        if request.current >= request.total {
            return PrefetchPlan::default();
        }

        let slices: Vec<u32> = match request.direction {
            Direction::Forward => self.ahead(request.current, request.total).collect(),
            Direction::Backward => self.behind(request.current).collect(),
            Direction::Both => self
                .ahead(request.current, request.total)
                .chain(self.behind(request.current))
                .collect(),
        };

        trace!(
            file = %request.file,
            current = request.current,
            direction = %request.direction,
            candidates = slices.len(),
            "planned prefetch candidates"
        );

        PrefetchPlan { slices }
    }
}
