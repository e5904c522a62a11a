#![forbid(unsafe_code)]

use async_trait::async_trait;
use config::{Pacing, PrefetchPolicy, Priority};
use imaging::{
    CacheError, FileId, ImageSource, SliceCache, SliceData, SourceError, VolumeMeta, keys,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use warmer::{Clock, Direction, PrefetchReport, SlicePrefetcher};

/// Cache stub that only answers probes. The warmer must never read or
/// write cache values itself, so those paths panic.
struct ProbeCache {
    present: HashSet<String>,
    fail_probes: bool,
    exists_calls: AtomicUsize,
}

impl ProbeCache {
    fn empty() -> Self {
        Self {
            present: HashSet::new(),
            fail_probes: false,
            exists_calls: AtomicUsize::new(0),
        }
    }

    fn with_slices(file: &FileId, indices: &[u32]) -> Self {
        Self {
            present: indices.iter().map(|&i| keys::slice_key(file, i)).collect(),
            ..Self::empty()
        }
    }

    fn failing() -> Self {
        Self {
            fail_probes: true,
            ..Self::empty()
        }
    }

    fn probes(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SliceCache for ProbeCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_probes {
            return Err(CacheError::Unavailable("probe refused".into()));
        }
        Ok(self.present.contains(key))
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        panic!("warmer must not read cache values");
    }

    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        panic!("warmer must not write the cache");
    }
}

/// Source stub with per-index failure scripting and call recording.
#[derive(Default)]
struct ScriptedSource {
    fail_backend: HashSet<u32>,
    fail_cache: HashSet<u32>,
    missing: HashSet<u32>,
    fail_metadata: bool,
    fetched: Mutex<Vec<u32>>,
    raw_fetches: AtomicUsize,
    metadata_fetches: AtomicUsize,
}

impl ScriptedSource {
    fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for ScriptedSource {
    async fn fetch_slice(
        &self,
        _file: &FileId,
        index: u32,
        normalize: bool,
    ) -> Result<Option<SliceData>, SourceError> {
        self.fetched.lock().unwrap().push(index);
        if !normalize {
            self.raw_fetches.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_backend.contains(&index) {
            return Err(SourceError::Backend("decoder gave up".into()));
        }
        if self.fail_cache.contains(&index) {
            return Err(CacheError::Unavailable("write-through refused".into()).into());
        }
        if self.missing.contains(&index) {
            return Ok(None);
        }
        Ok(Some(SliceData::new(index, 1, 1, vec![0])))
    }

    async fn fetch_metadata(&self, file: &FileId) -> Result<Option<VolumeMeta>, SourceError> {
        self.metadata_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata {
            return Err(SourceError::Backend("metadata store down".into()));
        }
        Ok(Some(VolumeMeta {
            file: file.clone(),
            total_slices: 100,
            width: 4,
            height: 4,
            modality: "CT".into(),
        }))
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

fn policy(count: u32, priority: Priority) -> PrefetchPolicy {
    PrefetchPolicy {
        enabled: true,
        count,
        priority,
        pacing: Pacing::default(),
    }
}

fn warmer_with(
    policy: PrefetchPolicy,
    cache: Arc<dyn SliceCache>,
    source: Arc<dyn ImageSource>,
) -> (SlicePrefetcher, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let warmer = SlicePrefetcher::new(policy, cache, source).with_clock(clock.clone());
    (warmer, clock)
}

#[tokio::test]
async fn only_uncached_neighbors_are_fetched() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::with_slices(&file, &[51, 53]));
    let source = Arc::new(ScriptedSource::default());
    let (warmer, _) = warmer_with(
        policy(3, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let warmed = warmer
        .prefetch_slices(&file, 50, 100, Direction::Forward)
        .await;

    assert_eq!(warmed, 1);
    assert_eq!(source.fetched(), vec![52]);
    assert_eq!(cache.probes(), 3);
    assert_eq!(source.raw_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fully_cached_plan_fetches_nothing() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::with_slices(&file, &[51, 52, 53]));
    let source = Arc::new(ScriptedSource::default());
    let (warmer, clock) = warmer_with(
        policy(3, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let warmed = warmer
        .prefetch_slices(&file, 50, 100, Direction::Forward)
        .await;

    assert_eq!(warmed, 0);
    assert!(source.fetched().is_empty());
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn partial_failures_do_not_stop_the_batch() {
    let file = FileId::new("mr-spine");
    let cache = Arc::new(ProbeCache::empty());
    let source = Arc::new(ScriptedSource {
        fail_backend: [12].into(),
        fail_cache: [14].into(),
        ..ScriptedSource::default()
    });
    let (warmer, _) = warmer_with(
        policy(5, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let warmed = warmer
        .prefetch_slices(&file, 10, 100, Direction::Forward)
        .await;

    assert_eq!(warmed, 3);
    // Failures must not shorten the batch or change its order.
    assert_eq!(source.fetched(), vec![11, 12, 13, 14, 15]);
}

#[tokio::test]
async fn disabled_policy_short_circuits_every_operation() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::empty());
    let source = Arc::new(ScriptedSource::default());
    let disabled = PrefetchPolicy {
        enabled: false,
        ..policy(3, Priority::High)
    };
    let (warmer, clock) = warmer_with(disabled, cache.clone(), source.clone());

    let warmed = warmer
        .prefetch_slices(&file, 50, 100, Direction::Both)
        .await;
    let report = warmer.prefetch_range(&file, 0, 10).await;
    let meta = warmer.prefetch_all_metadata(&file).await;

    assert_eq!(warmed, 0);
    assert_eq!(report, PrefetchReport::default());
    assert!(!meta);
    assert_eq!(cache.probes(), 0);
    assert!(source.fetched().is_empty());
    assert_eq!(source.metadata_fetches.load(Ordering::SeqCst), 0);
    assert!(clock.sleeps().is_empty());
    assert!(!warmer.stats().enabled);
}

#[tokio::test]
async fn pacing_delay_separates_fetches_without_trailing_sleep() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::empty());
    let source = Arc::new(ScriptedSource::default());
    let (warmer, clock) = warmer_with(
        policy(4, Priority::High),
        cache.clone(),
        source.clone(),
    );

    let warmed = warmer
        .prefetch_slices(&file, 0, 100, Direction::Forward)
        .await;

    assert_eq!(warmed, 4);
    // Three gaps for four fetches, each at the high-priority delay.
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(50); 3]);
}

#[tokio::test]
async fn pacing_delay_follows_priority() {
    let file = FileId::new("ct-head");
    for (priority, millis) in [
        (Priority::Low, 500),
        (Priority::Normal, 200),
        (Priority::High, 50),
    ] {
        let cache = Arc::new(ProbeCache::empty());
        let source = Arc::new(ScriptedSource::default());
        let (warmer, clock) = warmer_with(policy(2, priority), cache, source);

        warmer
            .prefetch_slices(&file, 10, 100, Direction::Forward)
            .await;

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(millis)]);
    }
}

#[tokio::test]
async fn failing_probes_fall_open_to_fetching() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::failing());
    let source = Arc::new(ScriptedSource::default());
    let (warmer, _) = warmer_with(
        policy(3, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let warmed = warmer
        .prefetch_slices(&file, 50, 100, Direction::Forward)
        .await;

    // An unreachable cache must degrade to warming everything, not to
    // warming nothing.
    assert_eq!(warmed, 3);
    assert_eq!(source.fetched(), vec![51, 52, 53]);
}

#[tokio::test]
async fn range_prefetch_is_inclusive_and_reports_failures() {
    let file = FileId::new("us-abdomen");
    let cache = Arc::new(ProbeCache::with_slices(&file, &[11]));
    let source = Arc::new(ScriptedSource {
        fail_backend: [13].into(),
        ..ScriptedSource::default()
    });
    let (warmer, _) = warmer_with(
        policy(3, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let report = warmer.prefetch_range(&file, 10, 14).await;

    assert_eq!(report, PrefetchReport {
        warmed: 3,
        failed: 1,
    });
    assert_eq!(source.fetched(), vec![10, 12, 13, 14]);
}

#[tokio::test]
async fn inverted_range_is_a_no_op() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::empty());
    let source = Arc::new(ScriptedSource::default());
    let (warmer, _) = warmer_with(
        policy(3, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let report = warmer.prefetch_range(&file, 8, 3).await;

    assert_eq!(report, PrefetchReport::default());
    assert_eq!(cache.probes(), 0);
    assert!(source.fetched().is_empty());
}

#[tokio::test]
async fn unavailable_slices_count_as_failed() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::empty());
    let source = Arc::new(ScriptedSource {
        missing: [11].into(),
        ..ScriptedSource::default()
    });
    let (warmer, _) = warmer_with(
        policy(2, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let report = warmer.prefetch_range(&file, 11, 12).await;

    assert_eq!(report, PrefetchReport {
        warmed: 1,
        failed: 1,
    });
}

/// One store standing in for both seams: probing reports warm only after
/// the source has been asked once, the way a write-through source behaves.
struct MetaWarmStore {
    warm: AtomicBool,
    metadata_fetches: AtomicUsize,
}

impl MetaWarmStore {
    fn cold() -> Self {
        Self {
            warm: AtomicBool::new(false),
            metadata_fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SliceCache for MetaWarmStore {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        assert!(key.starts_with("metadata:"), "unexpected probe for {key}");
        Ok(self.warm.load(Ordering::SeqCst))
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        panic!("warmer must not read cache values");
    }

    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        panic!("warmer must not write the cache");
    }
}

#[async_trait]
impl ImageSource for MetaWarmStore {
    async fn fetch_slice(
        &self,
        _file: &FileId,
        _index: u32,
        _normalize: bool,
    ) -> Result<Option<SliceData>, SourceError> {
        panic!("no slice traffic expected");
    }

    async fn fetch_metadata(&self, file: &FileId) -> Result<Option<VolumeMeta>, SourceError> {
        self.metadata_fetches.fetch_add(1, Ordering::SeqCst);
        self.warm.store(true, Ordering::SeqCst);
        Ok(Some(VolumeMeta {
            file: file.clone(),
            total_slices: 1,
            width: 1,
            height: 1,
            modality: "CT".into(),
        }))
    }
}

#[tokio::test]
async fn metadata_prefetch_is_idempotent() {
    let file = FileId::new("ct-head");
    let store = Arc::new(MetaWarmStore::cold());
    let (warmer, _) = warmer_with(
        policy(3, Priority::Normal),
        store.clone(),
        store.clone(),
    );

    assert!(warmer.prefetch_all_metadata(&file).await);
    assert!(warmer.prefetch_all_metadata(&file).await);

    // The second call sees the warm probe and never reaches the source.
    assert_eq!(store.metadata_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn metadata_failure_reports_cold() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::empty());
    let source = Arc::new(ScriptedSource {
        fail_metadata: true,
        ..ScriptedSource::default()
    });
    let (warmer, _) = warmer_with(
        policy(3, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    assert!(!warmer.prefetch_all_metadata(&file).await);
    assert_eq!(source.metadata_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stats_reflect_clamped_policy() {
    let cache: Arc<dyn SliceCache> = Arc::new(ProbeCache::empty());
    let source: Arc<dyn ImageSource> = Arc::new(ScriptedSource::default());

    let oversized = SlicePrefetcher::new(policy(1000, Priority::High), cache.clone(), source.clone());
    let stats = oversized.stats();
    assert_eq!(stats.prefetch_count, 64);
    assert_eq!(stats.priority, Priority::High);
    assert_eq!(stats.priority_delay, Duration::from_millis(50));

    let undersized = SlicePrefetcher::new(policy(0, Priority::Low), cache, source);
    let stats = undersized.stats();
    assert_eq!(stats.prefetch_count, 1);
    assert_eq!(stats.priority_delay, Duration::from_millis(500));
}

#[tokio::test]
async fn position_past_volume_end_probes_nothing() {
    let file = FileId::new("ct-head");
    let cache = Arc::new(ProbeCache::empty());
    let source = Arc::new(ScriptedSource::default());
    let (warmer, _) = warmer_with(
        policy(3, Priority::Normal),
        cache.clone(),
        source.clone(),
    );

    let warmed = warmer
        .prefetch_slices(&file, 100, 100, Direction::Both)
        .await;

    assert_eq!(warmed, 0);
    assert_eq!(cache.probes(), 0);
    assert!(source.fetched().is_empty());
}
