#![forbid(unsafe_code)]

use crate::clock::{Clock, SystemClock};
use crate::plan::{Direction, PrefetchReport, PrefetchRequest};
use crate::planner::{NeighborPlanner, PrefetchPlanner};
use config::{PrefetchPolicy, Priority};
use imaging::{FileId, ImageSource, SliceCache, keys};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Background cache warmer.
///
/// Turns navigation events into rate-limited sequential fetches through
/// the image source, which writes the cache as a side effect of serving.
/// The warmer itself never writes the cache and never surfaces an error:
/// warming is an optimization, and every failure mode degrades to a
/// smaller success count.
pub struct SlicePrefetcher {
    policy: PrefetchPolicy,
    planner: Box<dyn PrefetchPlanner>,
    cache: Arc<dyn SliceCache>,
    source: Arc<dyn ImageSource>,
    clock: Arc<dyn Clock>,
}

/// Read-only snapshot of the warmer's effective configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetcherStats {
    pub enabled: bool,
    pub prefetch_count: u32,
    pub priority: Priority,
    pub priority_delay: Duration,
}

impl SlicePrefetcher {
    /// The policy is clamped and captured once; the instance is immutable
    /// afterwards.
    pub fn new(
        policy: PrefetchPolicy,
        cache: Arc<dyn SliceCache>,
        source: Arc<dyn ImageSource>,
    ) -> Self {
        let policy = policy.clamp();
        let planner = Box::new(NeighborPlanner::new(policy.count));
        Self {
            policy,
            planner,
            cache,
            source,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the default neighbor planner.
    pub fn with_planner(mut self, planner: Box<dyn PrefetchPlanner>) -> Self {
        self.planner = planner;
        self
    }

    /// Replace the pacing clock, mainly for tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Warm the neighbors of `current` in the direction of travel.
    ///
    /// Returns the number of slices actually warmed. Zero means nothing
    /// needed doing (disabled, empty plan, everything cached) just as much
    /// as it can mean every attempt failed; callers that care about the
    /// difference use [`prefetch_range`](Self::prefetch_range).
    pub async fn prefetch_slices(
        &self,
        file: &FileId,
        current: u32,
        total: u32,
        direction: Direction,
    ) -> usize {
        if !self.policy.enabled {
            return 0;
        }

        let request = PrefetchRequest {
            file: file.clone(),
            current,
            total,
            direction,
        };
        let plan = self.planner.plan(&request);
        if plan.is_empty() {
            return 0;
        }

        let pending = self.filter_uncached(file, &plan.slices).await;
        if pending.is_empty() {
            trace!(%file, current, "planned slices already cached");
            return 0;
        }

        let report = self.warm(file, &pending).await;
        debug!(
            %file,
            current,
            direction = %direction,
            warmed = report.warmed,
            failed = report.failed,
            "prefetch batch finished"
        );
        report.warmed
    }

    /// Warm an explicit inclusive slice range through the same pipeline.
    ///
    /// Unlike [`prefetch_slices`](Self::prefetch_slices) the range is given
    /// by the caller rather than planned, so the full report is returned.
    pub async fn prefetch_range(&self, file: &FileId, start: u32, end: u32) -> PrefetchReport {
        if !self.policy.enabled || start > end {
            return PrefetchReport::default();
        }

        let candidates: Vec<u32> = (start..=end).collect();
        let pending = self.filter_uncached(file, &candidates).await;
        if pending.is_empty() {
            return PrefetchReport::default();
        }

        let report = self.warm(file, &pending).await;
        debug!(
            %file,
            start,
            end,
            warmed = report.warmed,
            failed = report.failed,
            "range prefetch finished"
        );
        report
    }

    /// Make sure the volume's metadata is cached. Returns whether the
    /// metadata is warm once the call finishes.
    pub async fn prefetch_all_metadata(&self, file: &FileId) -> bool {
        if !self.policy.enabled {
            return false;
        }

        match self.cache.exists(&keys::metadata_key(file)).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => debug!(%file, %err, "metadata probe failed, assuming absent"),
        }

        match self.source.fetch_metadata(file).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                debug!(%file, "metadata not available from source");
                false
            }
            Err(err) => {
                warn!(%file, %err, "metadata prefetch failed");
                false
            }
        }
    }

    /// Effective configuration after clamping; pure read.
    pub fn stats(&self) -> PrefetcherStats {
        PrefetcherStats {
            enabled: self.policy.enabled,
            prefetch_count: self.policy.count,
            priority: self.policy.priority,
            priority_delay: self.policy.delay(),
        }
    }

    /// Keep only candidates whose slice key is absent from the cache,
    /// preserving order. A failing probe counts as absent: warming a slice
    /// twice is cheaper than skipping one the viewer will ask for.
    async fn filter_uncached(&self, file: &FileId, candidates: &[u32]) -> Vec<u32> {
        let mut pending = Vec::with_capacity(candidates.len());
        for &index in candidates {
            let cached = match self.cache.exists(&keys::slice_key(file, index)).await {
                Ok(cached) => cached,
                Err(err) => {
                    debug!(%file, slice = index, %err, "cache probe failed, assuming absent");
                    false
                }
            };
            if !cached {
                pending.push(index);
            }
        }
        pending
    }

    /// Sequential fetch loop with a pacing delay between fetches and none
    /// after the last one. Individual failures are counted, never
    /// propagated.
    async fn warm(&self, file: &FileId, slices: &[u32]) -> PrefetchReport {
        let delay = self.policy.delay();
        let mut report = PrefetchReport::default();

        for (position, &index) in slices.iter().enumerate() {
            if position > 0 {
                self.clock.sleep(delay).await;
            }

            // Warmed slices must match what the viewer will ask for, and
            // the cache key carries no rendition component, so warming
            // always requests the normalized rendition.
            match self.source.fetch_slice(file, index, true).await {
                Ok(Some(_)) => report.warmed += 1,
                Ok(None) => {
                    debug!(%file, slice = index, "slice not available, skipped");
                    report.failed += 1;
                }
                Err(err) => {
                    warn!(%file, slice = index, %err, "slice prefetch failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
