use bincode::{Decode, Encode};
use std::fmt;

/// Identifier of a stored image file (DICOM series or NIfTI volume).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileId").field(&self.0).finish()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct VolumeMeta {
    pub file: FileId,
    pub total_slices: u32,
    pub width: u32,
    pub height: u32,
    pub modality: String,
}

/// One decoded 2D cross-section of a volume, 8-bit grayscale.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SliceData {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SliceData {
    pub fn new(index: u32, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            pixels,
        }
    }

    /// Contrast-stretched copy: the observed min..max range mapped to 0..255.
    /// Uniform or empty planes are returned unchanged.
    pub fn normalized(&self) -> Self {
        let min = self.pixels.iter().copied().min();
        let max = self.pixels.iter().copied().max();
        let (Some(min), Some(max)) = (min, max) else {
            return self.clone();
        };
        if min == max {
            return self.clone();
        }

        let span = (max - min) as u16;
        let pixels = self
            .pixels
            .iter()
            .map(|&p| ((p - min) as u16 * 255 / span) as u8)
            .collect();

        Self {
            index: self.index,
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}
