use clap::Parser;
use config::Config;
use flume::bounded;
use imaging::{MemoryCache, VolumeMeta, VolumeStore};
use slicewarm::cli::Cli;
use slicewarm::signals::{SignalEvent, wait_for_signal};
use slicewarm::workload::{Workload, volume_id};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_log::AsTrace;
use warmer::{SlicePrefetcher, SliceSession};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const SLICE_WIDTH: u32 = 32;
const SLICE_HEIGHT: u32 = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.log_level_filter().as_trace())
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    debug!(config = ?cli);

    let config = match &cli.conffile {
        Some(path) => Config::load(path)?,
        _ => Config::new(),
    };

    let (cache, session) = compose(&config, &cli);
    let workload = Workload::new(cli.pattern, cli.volumes, cli.slices, cli.steps, cli.seed);
    info!(
        volumes = cli.volumes,
        slices = cli.slices,
        steps = cli.steps,
        pattern = ?cli.pattern,
        "replaying viewer workload"
    );

    let (events_tx, events_rx) = bounded(8);
    let cancel = CancellationToken::new();

    let driver = drive(
        &session,
        workload,
        Duration::from_millis(cli.think_ms),
        cancel.clone(),
    );
    tokio::pin!(driver);

    let summary = loop {
        tokio::select! {
            err = wait_for_signal(&events_tx) => {
                tracing::error!(error = ?err, "Error while waiting for signal");
                err?;
            }
            //
            res = events_rx.recv_async() => {
                match res? {
                    SignalEvent::DumpStats => {
                        let stats = session.prefetcher().stats();
                        let metrics = cache.metrics();
                        info!(
                            ?stats,
                            hits = metrics.hits,
                            misses = metrics.misses,
                            entries = metrics.entries,
                            hit_rate = metrics.hit_rate(),
                            "warm-up statistics"
                        );
                    }
                    SignalEvent::Shutdown => {
                        info!("shutdown requested, finishing current step");
                        cancel.cancel();
                    }
                }
            }
            //
            summary = &mut driver => break summary,
        }
    };

    let metrics = cache.metrics();
    info!(
        steps = summary.steps,
        served = summary.served,
        missing = summary.missing,
        errors = summary.errors,
        mean_fetch = ?summary.mean_fetch(),
        hits = metrics.hits,
        misses = metrics.misses,
        entries = metrics.entries,
        hit_rate = metrics.hit_rate(),
        stats = ?session.prefetcher().stats(),
        "workload finished"
    );
    Ok(())
}

/// Wires cache, store and warmer together and loads the synthetic volumes
/// the workload will navigate.
fn compose(config: &Config, cli: &Cli) -> (Arc<MemoryCache>, SliceSession) {
    let cache = Arc::new(MemoryCache::new());
    let store = Arc::new(
        VolumeStore::new(cache.clone(), &config.cache)
            .with_decode_delay(Duration::from_millis(cli.decode_delay_ms)),
    );

    let plane_len = (SLICE_WIDTH * SLICE_HEIGHT) as usize;
    for volume in 0..cli.volumes {
        let file = volume_id(volume);
        let planes = (0..cli.slices)
            .map(|slice| synthetic_plane(volume, slice, plane_len))
            .collect();
        store.insert_volume(
            VolumeMeta {
                file: file.clone(),
                total_slices: cli.slices,
                width: SLICE_WIDTH,
                height: SLICE_HEIGHT,
                modality: "CT".into(),
            },
            planes,
        );
    }

    let prefetcher = Arc::new(SlicePrefetcher::new(
        config.prefetch.clone(),
        cache.clone(),
        store.clone(),
    ));
    let session = SliceSession::new(store, prefetcher);
    (cache, session)
}

/// Deterministic pixel ramp, phased per slice so normalization has real
/// work to do.
fn synthetic_plane(volume: u32, slice: u32, len: usize) -> Vec<u8> {
    let phase = volume.wrapping_mul(131).wrapping_add(slice.wrapping_mul(7));
    (0..len as u32).map(|p| ((p + phase) % 251) as u8).collect()
}

#[derive(Debug, Default)]
struct DriveSummary {
    steps: u32,
    served: u32,
    missing: u32,
    errors: u32,
    /// Foreground time spent waiting on slices, think time excluded.
    fetching: Duration,
}

impl DriveSummary {
    fn mean_fetch(&self) -> Duration {
        match self.steps {
            0 => Duration::ZERO,
            steps => self.fetching / steps,
        }
    }
}

/// Replays the workload one navigation step at a time, stopping early when
/// cancelled. Each step is the interactive path: serve the slice, then let
/// the session warm neighbors in the background.
async fn drive(
    session: &SliceSession,
    workload: Workload,
    think: Duration,
    cancel: CancellationToken,
) -> DriveSummary {
    let mut summary = DriveSummary::default();

    for event in workload {
        if cancel.is_cancelled() {
            break;
        }

        let started = Instant::now();
        match session
            .slice(&event.file, event.slice, event.total, event.direction, true)
            .await
        {
            Ok(Some(_)) => summary.served += 1,
            Ok(None) => {
                warn!(file = %event.file, slice = event.slice, "slice missing from store");
                summary.missing += 1;
            }
            Err(err) => {
                warn!(file = %event.file, slice = event.slice, %err, "slice fetch failed");
                summary.errors += 1;
            }
        }
        summary.fetching += started.elapsed();
        summary.steps += 1;

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(think) => {}
        }
    }

    summary
}
