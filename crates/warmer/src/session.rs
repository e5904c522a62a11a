#![forbid(unsafe_code)]

use crate::plan::{Direction, PrefetchRequest};
use crate::prefetcher::SlicePrefetcher;
use imaging::{FileId, ImageSource, SliceData, SourceError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Access-path facade for the serving layer.
///
/// Serves the requested slice in the foreground and kicks off warming of
/// its neighbors in a detached task, so the viewer never waits on the
/// warmer. Response first, prefetch second.
pub struct SliceSession {
    source: Arc<dyn ImageSource>,
    prefetcher: Arc<SlicePrefetcher>,
}

impl SliceSession {
    pub fn new(source: Arc<dyn ImageSource>, prefetcher: Arc<SlicePrefetcher>) -> Self {
        Self { source, prefetcher }
    }

    /// Foreground slice fetch plus detached neighbor warming.
    ///
    /// Source errors propagate: this is the interactive path, not the
    /// warming path. The spawned warmer is not awaited; callers that need
    /// to observe it use [`spawn_prefetch`](Self::spawn_prefetch) directly.
    pub async fn slice(
        &self,
        file: &FileId,
        index: u32,
        total: u32,
        direction: Direction,
        normalize: bool,
    ) -> Result<Option<SliceData>, SourceError> {
        let data = self.source.fetch_slice(file, index, normalize).await?;
        self.spawn_prefetch(PrefetchRequest {
            file: file.clone(),
            current: index,
            total,
            direction,
        });
        Ok(data)
    }

    /// Fire-and-forget warm-up for one navigation event.
    ///
    /// The task runs to completion even if the triggering request's
    /// connection goes away; its work is bounded by the planning window
    /// and the pacing delay. The handle resolves to the number of slices
    /// warmed.
    pub fn spawn_prefetch(&self, request: PrefetchRequest) -> JoinHandle<usize> {
        let prefetcher = Arc::clone(&self.prefetcher);
        tokio::spawn(async move {
            let warmed = prefetcher
                .prefetch_slices(
                    &request.file,
                    request.current,
                    request.total,
                    request.direction,
                )
                .await;
            if warmed > 0 {
                debug!(
                    file = %request.file,
                    current = request.current,
                    warmed,
                    "background warm-up finished"
                );
            }
            warmed
        })
    }

    pub fn prefetcher(&self) -> &Arc<SlicePrefetcher> {
        &self.prefetcher
    }
}
