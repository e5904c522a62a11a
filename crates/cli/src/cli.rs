use crate::workload::AccessPattern;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::{Path, PathBuf};

/// Slicewarm: cache warm-up driver for sliced image volumes
///
/// Loads synthetic volumes into an in-memory store, replays a simulated
/// viewer navigating through them, and lets the prefetcher warm the slice
/// cache in the background. Send SIGUSR1 for a statistics snapshot.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_parser = validate_file)]
    pub conffile: Option<PathBuf>,

    /// Number of synthetic volumes to load into the store.
    #[arg(long, default_value_t = 4)]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub volumes: u32,

    /// Slices per synthetic volume.
    #[arg(long, default_value_t = 60)]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub slices: u32,

    /// Navigation steps to replay before exiting.
    #[arg(long, default_value_t = 200)]
    pub steps: u32,

    /// Navigation pattern the simulated viewer follows.
    #[arg(long, value_enum, default_value_t = AccessPattern::Sweep)]
    pub pattern: AccessPattern,

    /// Seed for the random pattern.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Viewer think time between steps, in milliseconds.
    #[arg(long, default_value_t = 10)]
    pub think_ms: u64,

    /// Simulated decode latency per slice, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub decode_delay_ms: u64,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}
