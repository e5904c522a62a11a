//! Cache key convention shared by every tier that touches the slice cache.

use crate::FileId;

/// Key of a rendered slice: `slice:{file_id}:{slice_index}`.
pub fn slice_key(file: &FileId, index: u32) -> String {
    format!("slice:{file}:{index}")
}

/// Key of a volume's metadata: `metadata:{file_id}`.
pub fn metadata_key(file: &FileId) -> String {
    format!("metadata:{file}")
}
