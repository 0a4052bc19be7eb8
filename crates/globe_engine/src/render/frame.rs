//! Frame driving
//!
//! A thin controller that runs one frame: reset per-frame state, walk the
//! layer tree (a collaborator), drain the ordered renderable queue for draw
//! submission, then destroy evicted GPU resources at the frame-safe point.

use crate::cache::RenderResourceCache;
use crate::config::{ConfigError, EngineConfig};
use crate::render::backend::GraphicsDevice;
use crate::render::ordered_queue::OrderedRenderableQueue;
use crate::retrieve::AssetLocator;
use nalgebra::Point3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Redraw request flag shared between retrieval callbacks and the platform
/// surface.
///
/// Workers call [`request`](Self::request) when a background retrieval
/// completes; the surface polls [`take`](Self::take) to decide whether to
/// schedule another frame.
#[derive(Debug, Clone, Default)]
pub struct RedrawSignal(Arc<AtomicBool>);

impl RedrawSignal {
    /// Create an unsignaled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a redraw. Safe to call from any thread.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the request, returning whether one was pending.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    /// Whether a request is pending, without consuming it.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Something the ordered queue can draw.
pub trait Renderable {
    /// Submit this renderable's draw calls.
    fn draw(&mut self, dc: &mut DrawContext<'_>);
}

/// A scene layer walked once per frame. The layer tree itself is a
/// collaborator; the frame controller only iterates it.
pub trait Layer {
    /// Contribute to the frame: retrieve resources, offer renderables.
    fn render(&mut self, dc: &mut DrawContext<'_>);
}

/// Everything a layer or renderable needs while contributing to a frame.
pub struct DrawContext<'a> {
    /// The device owned by the platform surface.
    pub device: &'a mut dyn GraphicsDevice,
    /// The GPU resource cache.
    pub resources: &'a mut RenderResourceCache,
    queue: &'a mut OrderedRenderableQueue<Box<dyn Renderable>>,
    eye_point: Point3<f64>,
}

impl DrawContext<'_> {
    /// Queue a renderable for ordered submission this frame. Larger sort
    /// keys draw first, so eye distance gives back-to-front traversal;
    /// negate the key for the opposite order.
    pub fn offer_renderable(&mut self, renderable: Box<dyn Renderable>, sort_key: f64) {
        self.queue.offer(renderable, sort_key);
    }

    /// The eye position for this frame.
    pub fn eye_point(&self) -> Point3<f64> {
        self.eye_point
    }

    /// Distance from the eye to `point`, the usual sort key.
    pub fn distance_to_eye(&self, point: &Point3<f64>) -> f64 {
        (point - self.eye_point).norm()
    }
}

/// Drives one frame at a time on behalf of the platform surface.
pub struct FrameController {
    resources: RenderResourceCache,
    queue: OrderedRenderableQueue<Box<dyn Renderable>>,
    eye_point: Point3<f64>,
    frame_count: u64,
}

impl FrameController {
    /// Create a controller from a validated configuration.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_cache(RenderResourceCache::new(config)?))
    }

    /// Create a controller whose retriever resolves bundled assets through
    /// `locator`.
    pub fn with_asset_locator(
        config: &EngineConfig,
        locator: Arc<dyn AssetLocator>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_cache(RenderResourceCache::with_asset_locator(
            config,
            Some(locator),
        )?))
    }

    fn from_cache(resources: RenderResourceCache) -> Self {
        Self {
            resources,
            queue: OrderedRenderableQueue::new(),
            eye_point: Point3::origin(),
            frame_count: 0,
        }
    }

    /// The resource cache.
    pub fn resources(&self) -> &RenderResourceCache {
        &self.resources
    }

    /// Mutable access to the resource cache.
    pub fn resources_mut(&mut self) -> &mut RenderResourceCache {
        &mut self.resources
    }

    /// The redraw signal the platform surface should poll.
    pub fn redraw_signal(&self) -> RedrawSignal {
        self.resources.redraw_signal()
    }

    /// Set the eye position used for sort keys this frame.
    pub fn set_eye_point(&mut self, eye_point: Point3<f64>) {
        self.eye_point = eye_point;
    }

    /// The current eye position.
    pub fn eye_point(&self) -> Point3<f64> {
        self.eye_point
    }

    /// Number of frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Render one frame.
    ///
    /// Walks `layers` so they can retrieve resources and offer renderables,
    /// drains the ordered queue for submission, then destroys resources
    /// evicted during the frame, the single point where no pending draw
    /// call can still reference them.
    pub fn render_frame(&mut self, device: &mut dyn GraphicsDevice, layers: &mut [Box<dyn Layer>]) {
        self.frame_count += 1;
        log::trace!("Frame {} begin", self.frame_count);

        // Begin frame: the per-frame queue resets here, exactly once.
        self.queue.clear();

        {
            let mut dc = DrawContext {
                device: &mut *device,
                resources: &mut self.resources,
                queue: &mut self.queue,
                eye_point: self.eye_point,
            };
            for layer in layers.iter_mut() {
                layer.render(&mut dc);
            }
        }

        // Submission: drain back-to-front. Renderables offered during
        // submission are not drawn; the next begin-frame clear discards
        // them.
        let mut submission = std::mem::take(&mut self.queue);
        {
            let mut dc = DrawContext {
                device: &mut *device,
                resources: &mut self.resources,
                queue: &mut self.queue,
                eye_point: self.eye_point,
            };
            while let Some(mut renderable) = submission.poll() {
                renderable.draw(&mut dc);
            }
        }

        // Frame-safe point: every draw is submitted.
        self.resources.release_evicted_resources(device);
        log::trace!("Frame {} end", self.frame_count);
    }

    /// The platform surface tore down its graphics context. Invalidate the
    /// cache without touching the dead handles and reset per-frame state.
    pub fn context_lost(&mut self) {
        self.resources.context_lost();
        self.queue.clear();
    }

    /// Stop background workers and drop the controller.
    pub fn shutdown(self) {
        self.resources.shutdown();
    }
}
