#![forbid(unsafe_code)]
//! Slice prefetch planning and cache warm-up.
//!
//! Split the way it is tested: [`PrefetchPlanner`] is the pure half that
//! decides which slices a navigation event makes worth warming, and
//! [`SlicePrefetcher`] is the effectful half that probes the cache, paces
//! fetches through the [`imaging::ImageSource`], and absorbs failures.
//! [`SliceSession`] sits on top and keeps warming off the interactive
//! path.

mod clock;
mod plan;
mod planner;
mod prefetcher;
mod session;

pub use clock::{Clock, SystemClock};
pub use plan::{Direction, PrefetchPlan, PrefetchReport, PrefetchRequest};
pub use planner::{NeighborPlanner, PrefetchPlanner};
pub use prefetcher::{PrefetcherStats, SlicePrefetcher};
pub use session::SliceSession;
