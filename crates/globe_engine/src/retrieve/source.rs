//! Image source variants and their cache keys

use crate::retrieve::ImageData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity counter for in-memory sources. Two sources built from the same
/// pixels or bytes are distinct resources unless the same value is reused.
static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// An external image source a texture can be retrieved from.
///
/// In-memory variants are immediately available and never go through the
/// worker pool; the remaining variants are resolved and decoded on a worker
/// thread.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Pixels already decoded in memory, identity-keyed.
    Pixels {
        /// Identity of this source.
        id: u64,
        /// The decoded image.
        image: Arc<ImageData>,
    },
    /// Encoded bytes (PNG, JPEG, ...) in memory, identity-keyed.
    Bytes {
        /// Identity of this source.
        id: u64,
        /// The encoded bytes.
        bytes: Arc<[u8]>,
    },
    /// A bundled asset resolved through the registered asset locator.
    Asset(String),
    /// A filesystem path.
    File(PathBuf),
    /// An HTTP(S) URL.
    Url(String),
}

impl ImageSource {
    /// Wrap already-decoded pixels.
    pub fn from_pixels(image: ImageData) -> Self {
        Self::Pixels {
            id: NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed),
            image: Arc::new(image),
        }
    }

    /// Wrap encoded image bytes held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::Bytes {
            id: NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed),
            bytes: bytes.into(),
        }
    }

    /// Reference a bundled asset by name.
    pub fn asset(name: impl Into<String>) -> Self {
        Self::Asset(name.into())
    }

    /// Reference an image file on disk.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Reference an image by URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// The value-comparable key identifying this source in caches and
    /// in-flight tracking.
    pub fn key(&self) -> SourceKey {
        match self {
            Self::Pixels { id, .. } => SourceKey::Memory(*id),
            Self::Bytes { id, .. } => SourceKey::Memory(*id),
            Self::Asset(name) => SourceKey::Asset(name.clone()),
            Self::File(path) => SourceKey::File(path.clone()),
            Self::Url(url) => SourceKey::Url(url.clone()),
        }
    }

    /// Whether this source is available without background retrieval.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Pixels { .. })
    }
}

/// Opaque, value-comparable key for an image source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    /// Identity of an in-memory source.
    Memory(u64),
    /// Bundled asset name.
    Asset(String),
    /// Filesystem path.
    File(PathBuf),
    /// URL string.
    Url(String),
}
