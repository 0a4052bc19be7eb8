//! Asynchronous image retrieval
//!
//! Turns external image sources (in-memory pixels or bytes, bundled assets,
//! files, URLs) into decoded pixel buffers on a bounded pool of worker
//! threads, without ever touching the graphics context. Results travel back
//! to the render thread through callbacks that may only enqueue data.

pub mod image_data;
pub mod retriever;
pub mod source;

pub use image_data::ImageData;
pub use retriever::{AssetLocator, AsyncImageRetriever, RetrievalCallback};
pub use source::{ImageSource, SourceKey};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RetrieveError {
    /// The source bytes could not be decoded into an image.
    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    /// The source could not be read (missing file, unreadable asset).
    #[error("Failed to read image source: {0}")]
    ReadFailed(String),

    /// An asset source was requested but no asset locator is registered.
    #[error("No asset locator registered for asset: {0}")]
    AssetUnavailable(String),

    /// A network fetch exceeded the configured timeout.
    #[error("Network fetch timed out: {0}")]
    HttpTimeout(String),

    /// A network fetch failed for a reason other than a timeout.
    #[error("Network fetch failed: {0}")]
    HttpFailed(String),

    /// Every worker is busy; the submission was refused rather than queued.
    #[error("Retrieval pool saturated")]
    PoolSaturated,

    /// A retrieval for the same source is already in flight.
    #[error("Retrieval already in flight for this source")]
    AlreadyInFlight,

    /// The retriever has been shut down.
    #[error("Retriever is shut down")]
    ShutDown,
}

/// Result type for retrieval operations.
pub type RetrieveResult<T> = Result<T, RetrieveError>;
