pub mod keys;

mod cache;
mod error;
mod source;
mod volume;

pub use cache::{CacheMetrics, MemoryCache, SliceCache};
pub use error::{CacheError, SourceError};
pub use source::{ImageSource, VolumeStore};
pub use volume::{FileId, SliceData, VolumeMeta};
