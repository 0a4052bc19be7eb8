//! # Globe Engine
//!
//! Resource management and draw ordering core for a real-time 3D
//! terrain/globe renderer.
//!
//! ## What lives here
//!
//! - **Resource caching**: a capacity-bounded LRU cache of GPU-resident
//!   resources (textures, buffers, programs, glyph images) with deferred
//!   disposal, so eviction never invalidates an in-flight draw call
//! - **Asynchronous retrieval**: a bounded worker pool that decodes image
//!   sources off the render thread and hands results back through a queue
//! - **Draw ordering**: a per-frame ordered renderable queue with a
//!   deterministic back-to-front traversal and stable tie-breaking
//! - **Frame driving**: a thin controller that walks layers, drains the
//!   queue, and destroys evicted resources at the frame-safe point
//!
//! The tessellator, layer tree, platform surface, and graphics API backend
//! are collaborators behind small traits ([`render::Layer`],
//! [`render::GraphicsDevice`]); this crate owns the contracts between them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use globe_engine::prelude::*;
//!
//! let config = EngineConfig::default();
//! let mut frame = FrameController::new(&config).expect("valid config");
//! let redraw = frame.redraw_signal();
//!
//! // Each frame, the platform surface drives:
//! //   frame.set_eye_point(camera_eye);
//! //   frame.render_frame(&mut device, &mut layers);
//! //   if redraw.take() { /* schedule another frame */ }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod cache;
pub mod config;
pub mod foundation;
pub mod render;
pub mod retrieve;

/// Common imports for engine users
pub mod prelude {
    pub use crate::cache::{
        CacheStats, GpuResource, KeyedLruCache, RenderResourceCache, ResourceKey, TextKey,
    };
    pub use crate::config::{CacheConfig, ConfigError, EngineConfig, RetrievalConfig};
    pub use crate::render::{
        BufferKind, BufferObject, DeviceError, DrawContext, FrameController, GraphicsDevice,
        Layer, NativeHandle, OrderedRenderableQueue, PixelFormat, RedrawSignal, Renderable,
        ResourceState, ShaderProgram, Texture, TextureDescriptor,
    };
    pub use crate::retrieve::{
        AssetLocator, AsyncImageRetriever, ImageData, ImageSource, RetrievalCallback,
        RetrieveError, SourceKey,
    };
}
