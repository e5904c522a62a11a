use crate::{FileId, SliceCache, SliceData, SourceError, VolumeMeta, keys};
use async_trait::async_trait;
use config::CachePolicy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Decoded-slice provider over the stored image files.
///
/// A successful fetch populates the shared cache as a side effect, so a
/// cache probe after any foreground access sees the slice as present.
/// Fetching an unknown file or out-of-range index yields `Ok(None)`.
/// Implementations must tolerate concurrent fetches of the same slice;
/// the cache key is identical, so the last write wins and both callers
/// receive equivalent data.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_slice(
        &self,
        file: &FileId,
        index: u32,
        normalize: bool,
    ) -> Result<Option<SliceData>, SourceError>;

    async fn fetch_metadata(&self, file: &FileId) -> Result<Option<VolumeMeta>, SourceError>;
}

struct StoredVolume {
    meta: VolumeMeta,
    planes: Vec<Vec<u8>>,
}

/// In-memory volume set with cache write-through. Stands in for the
/// DICOM/NIfTI blob tier; an optional decode delay models the cost of the
/// real decode + storage round trip.
pub struct VolumeStore {
    volumes: RwLock<HashMap<FileId, StoredVolume>>,
    cache: Arc<dyn SliceCache>,
    slice_ttl: Duration,
    metadata_ttl: Duration,
    decode_delay: Duration,
}

impl VolumeStore {
    pub fn new(cache: Arc<dyn SliceCache>, policy: &CachePolicy) -> Self {
        Self {
            volumes: RwLock::new(HashMap::new()),
            cache,
            slice_ttl: policy.slice_ttl,
            metadata_ttl: policy.metadata_ttl,
            decode_delay: Duration::ZERO,
        }
    }

    /// Simulated per-miss decode latency. Cache hits skip it.
    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = delay;
        self
    }

    /// Register a volume: `planes[i]` is the raw plane of slice `i`.
    pub fn insert_volume(&self, meta: VolumeMeta, planes: Vec<Vec<u8>>) {
        debug_assert_eq!(meta.total_slices as usize, planes.len());
        self.volumes
            .write()
            .insert(meta.file.clone(), StoredVolume { meta, planes });
    }

    async fn decode_plane(&self, file: &FileId, index: u32) -> Option<SliceData> {
        if !self.decode_delay.is_zero() {
            tokio::time::sleep(self.decode_delay).await;
        }
        let volumes = self.volumes.read();
        let volume = volumes.get(file)?;
        let plane = volume.planes.get(index as usize)?;
        Some(SliceData::new(
            index,
            volume.meta.width,
            volume.meta.height,
            plane.clone(),
        ))
    }

    async fn lookup_meta(&self, file: &FileId) -> Option<VolumeMeta> {
        if !self.decode_delay.is_zero() {
            tokio::time::sleep(self.decode_delay).await;
        }
        self.volumes.read().get(file).map(|v| v.meta.clone())
    }
}

#[async_trait]
impl ImageSource for VolumeStore {
    async fn fetch_slice(
        &self,
        file: &FileId,
        index: u32,
        normalize: bool,
    ) -> Result<Option<SliceData>, SourceError> {
        let key = keys::slice_key(file, index);

        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match decode_slice(&bytes) {
                Ok(slice) => return Ok(Some(slice)),
                Err(err) => {
                    // Undecodable entry: fall through and overwrite it.
                    debug!(%file, slice = index, %err, "dropping corrupt cache entry");
                }
            },
            Ok(None) => {}
            Err(err) => {
                debug!(%file, slice = index, %err, "cache read failed, fetching from store");
            }
        }

        let Some(slice) = self.decode_plane(file, index).await else {
            return Ok(None);
        };
        let slice = if normalize { slice.normalized() } else { slice };

        match encode_slice(&slice) {
            Ok(bytes) => {
                if let Err(err) = self.cache.put(&key, bytes, self.slice_ttl).await {
                    warn!(%file, slice = index, %err, "cache write-through failed");
                }
            }
            Err(err) => warn!(%file, slice = index, %err, "slice encode failed, not cached"),
        }

        Ok(Some(slice))
    }

    async fn fetch_metadata(&self, file: &FileId) -> Result<Option<VolumeMeta>, SourceError> {
        let key = keys::metadata_key(file);

        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match decode_meta(&bytes) {
                Ok(meta) => return Ok(Some(meta)),
                Err(err) => {
                    debug!(%file, %err, "dropping corrupt metadata entry");
                }
            },
            Ok(None) => {}
            Err(err) => {
                debug!(%file, %err, "cache read failed, fetching metadata from store");
            }
        }

        let Some(meta) = self.lookup_meta(file).await else {
            return Ok(None);
        };

        match encode_meta(&meta) {
            Ok(bytes) => {
                if let Err(err) = self.cache.put(&key, bytes, self.metadata_ttl).await {
                    warn!(%file, %err, "metadata write-through failed");
                }
            }
            Err(err) => warn!(%file, %err, "metadata encode failed, not cached"),
        }

        Ok(Some(meta))
    }
}

fn encode_slice(slice: &SliceData) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::encode_to_vec(slice, bincode::config::standard())
}

fn decode_slice(bytes: &[u8]) -> Result<SliceData, bincode::error::DecodeError> {
    let (slice, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(slice)
}

fn encode_meta(meta: &VolumeMeta) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::encode_to_vec(meta, bincode::config::standard())
}

fn decode_meta(bytes: &[u8]) -> Result<VolumeMeta, bincode::error::DecodeError> {
    let (meta, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(meta)
}
