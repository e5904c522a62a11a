//! Workload driver that exercises the slice cache warmer end to end:
//! synthetic volumes in a [`imaging::VolumeStore`], a shared
//! [`imaging::MemoryCache`], and simulated viewer navigation feeding the
//! warmer.

pub mod cli;
pub mod error;
pub mod signals;
pub mod workload;
