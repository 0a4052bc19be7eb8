//! Render resource cache
//!
//! Specializes [`KeyedLruCache`] for GPU-resident resources. Owns the two
//! handoffs that keep the render loop stall-free:
//!
//! - eviction -> disposal: evicted resources are parked in a disposal queue
//!   and destroyed only at the per-frame safe point, never mid-draw;
//! - retrieval -> promotion: background decodes arrive on a channel drained
//!   only by the render thread, which alone creates GPU objects.

use crate::cache::lru::KeyedLruCache;
use crate::config::{ConfigError, EngineConfig};
use crate::render::backend::GraphicsDevice;
use crate::render::frame::RedrawSignal;
use crate::render::resources::{BufferObject, ShaderProgram, Texture};
use crate::retrieve::{
    AssetLocator, AsyncImageRetriever, ImageData, ImageSource, RetrievalCallback, RetrieveError,
    SourceKey,
};
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Key of a rendered-text glyph image: same text and style, same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextKey {
    /// The rendered string.
    pub text: String,
    /// Font size in pixels.
    pub font_px: u32,
    /// Text color, RGBA.
    pub color: [u8; 4],
    /// Whether the glyphs carry an outline.
    pub outline: bool,
}

/// Opaque, value-comparable cache key. A closed set of resource kinds rather
/// than open-ended dynamic dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// A texture retrieved from an image source.
    Texture(SourceKey),
    /// A tessellator-produced vertex/index buffer, by numeric id.
    Buffer(u64),
    /// A shader program, by program class name.
    Program(String),
    /// A rendered-text glyph image.
    GlyphImage(TextKey),
}

/// A cached GPU resource. The cache owns it exclusively until eviction hands
/// it to the disposal queue.
#[derive(Debug)]
pub enum GpuResource {
    /// A 2D texture.
    Texture(Texture),
    /// A vertex or index buffer.
    Buffer(BufferObject),
    /// A shader program.
    Program(ShaderProgram),
}

impl GpuResource {
    /// Destroy the native object through the device. Anomalies (such as an
    /// already-released resource) are logged by the resource itself and
    /// never interrupt disposal of the remaining queue.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        match self {
            Self::Texture(texture) => texture.release(device),
            Self::Buffer(buffer) => buffer.release(device),
            Self::Program(program) => program.release(device),
        }
    }

    /// Estimated byte cost for capacity accounting.
    pub fn estimated_cost(&self) -> usize {
        match self {
            Self::Texture(texture) => texture.estimated_cost(),
            Self::Buffer(buffer) => buffer.estimated_cost(),
            Self::Program(program) => program.estimated_cost(),
        }
    }
}

/// Running cache counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Lookups that found a resident resource.
    pub hits: u64,
    /// Lookups that found nothing resident and nothing newly promoted.
    pub misses: u64,
    /// Entries evicted to satisfy the capacity constraint.
    pub evictions: u64,
    /// Background retrievals that terminated in failure.
    pub retrieval_failures: u64,
}

/// One completed background retrieval, appended by a worker thread and
/// drained by the render thread.
struct RetrievalEvent {
    key: SourceKey,
    outcome: Result<ImageData, RetrieveError>,
}

/// Worker-side callback: only enqueues, never touches GPU state.
struct QueueingCallback {
    tx: Mutex<Sender<RetrievalEvent>>,
    redraw: RedrawSignal,
}

impl RetrievalCallback for QueueingCallback {
    fn succeeded(&self, source: &ImageSource, pixels: ImageData) {
        let _ = self.tx.lock().unwrap().send(RetrievalEvent {
            key: source.key(),
            outcome: Ok(pixels),
        });
        self.redraw.request();
    }

    fn failed(&self, source: &ImageSource, error: RetrieveError) {
        let _ = self.tx.lock().unwrap().send(RetrievalEvent {
            key: source.key(),
            outcome: Err(error),
        });
        // Redraw so the frame loop drains the failure and retires the
        // pending mark promptly.
        self.redraw.request();
    }

    fn rejected(&self, source: &ImageSource) {
        // The cache retires its pending mark synchronously when submission
        // fails; nothing to enqueue.
        log::debug!("Retrieval rejected for {:?}", source.key());
    }
}

/// Cache of GPU-resident resources with deferred disposal and asynchronous
/// texture retrieval.
///
/// Owned by the render thread. Only the retrieval channel sender and the
/// redraw signal ever cross a thread boundary.
pub struct RenderResourceCache {
    entries: KeyedLruCache<ResourceKey, GpuResource>,
    /// Small secondary cache de-duplicating prebuilt attribute bundles by
    /// name. CPU-side, so its evictions simply drop.
    bundles: KeyedLruCache<String, Arc<[u8]>>,
    /// Evicted resources awaiting destruction at the frame-safe point.
    disposal: Vec<(ResourceKey, GpuResource)>,
    retrievals: Receiver<RetrievalEvent>,
    /// Keys with a retrieval in flight; at most one per key.
    pending: HashSet<ResourceKey>,
    retriever: AsyncImageRetriever,
    callback: Arc<dyn RetrievalCallback>,
    redraw: RedrawSignal,
    stats: CacheStats,
}

impl RenderResourceCache {
    /// Create a cache without bundled-asset support.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::with_asset_locator(config, None)
    }

    /// Create a cache whose retriever resolves asset sources through
    /// `locator`.
    pub fn with_asset_locator(
        config: &EngineConfig,
        locator: Option<Arc<dyn AssetLocator>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::channel();
        let redraw = RedrawSignal::new();
        let callback: Arc<dyn RetrievalCallback> = Arc::new(QueueingCallback {
            tx: Mutex::new(tx),
            redraw: redraw.clone(),
        });
        let retriever = AsyncImageRetriever::with_asset_locator(&config.retrieval, locator);

        let cache = &config.cache;
        log::info!(
            "Render resource cache: capacity {} bytes, low-water {} bytes",
            cache.capacity_bytes,
            cache.low_water_bytes
        );

        Ok(Self {
            entries: KeyedLruCache::new(cache.capacity_bytes, cache.low_water_bytes),
            bundles: KeyedLruCache::new(
                cache.bundle_capacity_bytes,
                (cache.bundle_capacity_bytes * 3 / 4).max(1),
            ),
            disposal: Vec::new(),
            retrievals: rx,
            pending: HashSet::new(),
            retriever,
            callback,
            redraw,
            stats: CacheStats::default(),
        })
    }

    /// The signal fired when a background retrieval completes; the platform
    /// surface consumes it to schedule another frame.
    pub fn redraw_signal(&self) -> RedrawSignal {
        self.redraw.clone()
    }

    /// Retrieve the texture for `source`, non-blocking.
    ///
    /// Immediately-available in-memory pixels are wrapped and cached
    /// synchronously. Otherwise: a resident texture is returned directly;
    /// failing that, every completed background decode is promoted and the
    /// cache re-checked; failing that, a retrieval is submitted (unless one
    /// is already pending for this key) and `None` is returned; the caller
    /// re-polls on a later frame once the redraw signal fires.
    pub fn retrieve_texture(&mut self, source: &ImageSource) -> Option<&mut Texture> {
        let key = ResourceKey::Texture(source.key());

        if let ImageSource::Pixels { image, .. } = source {
            if self.entries.contains(&key) {
                self.stats.hits += 1;
            } else {
                let texture = Texture::from_image((**image).clone());
                let cost = texture.estimated_cost();
                self.insert(key.clone(), GpuResource::Texture(texture), cost);
            }
            return self.texture_mut(&key);
        }

        if self.entries.contains(&key) {
            self.stats.hits += 1;
            return self.texture_mut(&key);
        }

        // Promote everything that finished since the last drain, whichever
        // key was asked for, then re-check.
        self.drain_retrievals();
        if self.entries.contains(&key) {
            self.stats.hits += 1;
            return self.texture_mut(&key);
        }

        self.stats.misses += 1;
        if !self.pending.contains(&key) {
            match self
                .retriever
                .retrieve(source.clone(), Arc::clone(&self.callback))
            {
                Ok(()) => {
                    self.pending.insert(key);
                }
                Err(error) => {
                    log::debug!("Texture retrieval not started for {key:?}: {error}");
                }
            }
        }
        None
    }

    /// Retrieve the texture for a rendered-text glyph image, rasterizing it
    /// through `rasterize` on first use. Text rasterization is synchronous:
    /// the pixels are immediately available by construction.
    pub fn retrieve_text_texture<F>(&mut self, key: TextKey, rasterize: F) -> Option<&mut Texture>
    where
        F: FnOnce() -> ImageData,
    {
        let key = ResourceKey::GlyphImage(key);
        if self.entries.contains(&key) {
            self.stats.hits += 1;
        } else {
            let texture = Texture::from_image(rasterize());
            let cost = texture.estimated_cost();
            self.insert(key.clone(), GpuResource::Texture(texture), cost);
        }
        self.texture_mut(&key)
    }

    /// Store a tessellator-produced buffer under a numeric id.
    pub fn put_buffer(&mut self, id: u64, buffer: BufferObject) {
        let cost = buffer.estimated_cost();
        self.insert(ResourceKey::Buffer(id), GpuResource::Buffer(buffer), cost);
    }

    /// Look up a cached buffer, refreshing its recency.
    pub fn buffer_mut(&mut self, id: u64) -> Option<&mut BufferObject> {
        let key = ResourceKey::Buffer(id);
        if self.entries.contains(&key) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        match self.entries.get_mut(&key) {
            Some(GpuResource::Buffer(buffer)) => Some(buffer),
            _ => None,
        }
    }

    /// Store a shader program under its program class name.
    pub fn put_program(&mut self, name: impl Into<String>, program: ShaderProgram) {
        let cost = program.estimated_cost();
        self.insert(
            ResourceKey::Program(name.into()),
            GpuResource::Program(program),
            cost,
        );
    }

    /// Look up a cached program, refreshing its recency.
    pub fn program_mut(&mut self, name: &str) -> Option<&mut ShaderProgram> {
        let key = ResourceKey::Program(name.to_string());
        if self.entries.contains(&key) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        match self.entries.get_mut(&key) {
            Some(GpuResource::Program(program)) => Some(program),
            _ => None,
        }
    }

    /// De-duplicated prebuilt attribute bundle (unit quad vertices and the
    /// like), built on first use and shared thereafter.
    pub fn attribute_bundle<F>(&mut self, name: &str, build: F) -> Arc<[u8]>
    where
        F: FnOnce() -> Vec<u8>,
    {
        let key = name.to_string();
        if let Some(bundle) = self.bundles.get(&key) {
            return Arc::clone(bundle);
        }
        let bytes: Arc<[u8]> = build().into();
        let cost = bytes.len().max(1);
        self.bundles.put(key, Arc::clone(&bytes), cost);
        bytes
    }

    /// Drain the retrieval queue, promoting every completed decode into a
    /// cache entry and retiring failed retrievals. May run several times per
    /// frame; each pass drains fully so no completed decode starves.
    pub fn drain_retrievals(&mut self) {
        while let Ok(event) = self.retrievals.try_recv() {
            let key = ResourceKey::Texture(event.key);
            self.pending.remove(&key);
            match event.outcome {
                Ok(pixels) => {
                    log::debug!("Promoting completed retrieval for {key:?}");
                    let texture = Texture::from_image(pixels);
                    let cost = texture.estimated_cost();
                    self.insert(key, GpuResource::Texture(texture), cost);
                }
                Err(error) => {
                    self.stats.retrieval_failures += 1;
                    log::debug!("Background retrieval failed for {key:?}: {error}");
                }
            }
        }
    }

    /// Destroy every resource evicted since the last call.
    ///
    /// Must be called once per frame at a point where no in-flight draw call
    /// can still reference an evicted handle: after submission, before the
    /// next frame's allocations.
    pub fn release_evicted_resources(&mut self, device: &mut dyn GraphicsDevice) {
        if self.disposal.is_empty() {
            return;
        }
        log::trace!("Releasing {} evicted GPU resources", self.disposal.len());
        for (_key, mut resource) in self.disposal.drain(..) {
            resource.release(device);
        }
    }

    /// The graphics context was destroyed: every native handle is already
    /// invalid. Clears the cache map without disposal (nothing must be
    /// double-destroyed), empties both queues, and resets the used cost and
    /// pending marks so retrieval can start over.
    pub fn context_lost(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.disposal.clear();
        while self.retrievals.try_recv().is_ok() {}
        self.pending.clear();
        log::info!("Graphics context lost; dropped {dropped} cached resources");
    }

    /// Running counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Estimated bytes of resident GPU resources.
    pub fn used_cost(&self) -> usize {
        self.entries.used_cost()
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Number of resident resources.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of keys with a retrieval in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of evicted resources awaiting disposal.
    pub fn disposal_count(&self) -> usize {
        self.disposal.len()
    }

    /// The background retriever (worker pool introspection).
    pub fn retriever(&self) -> &AsyncImageRetriever {
        &self.retriever
    }

    /// Stop the retrieval workers and drop the cache. GPU resources still
    /// resident are dropped without device calls; callers that want them
    /// destroyed release them through a frame first.
    pub fn shutdown(self) {
        self.retriever.shutdown();
    }

    fn insert(&mut self, key: ResourceKey, resource: GpuResource, cost: usize) {
        let result = self.entries.put(key.clone(), resource, cost);
        if let Some(previous) = result.previous {
            log::debug!("Replacing cached resource {key:?}");
            self.disposal.push((key, previous));
        }
        for (evicted_key, evicted) in result.evicted {
            log::trace!("Evicted {evicted_key:?} to disposal queue");
            self.stats.evictions += 1;
            self.disposal.push((evicted_key, evicted));
        }
    }

    fn texture_mut(&mut self, key: &ResourceKey) -> Option<&mut Texture> {
        match self.entries.get_mut(key) {
            Some(GpuResource::Texture(texture)) => Some(texture),
            Some(_) => {
                log::error!("Resource kind mismatch for {key:?}");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, RetrievalConfig};
    use crate::render::backend::testing::RecordingDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_config(capacity_bytes: usize, low_water_bytes: usize) -> EngineConfig {
        EngineConfig {
            cache: CacheConfig {
                capacity_bytes,
                low_water_bytes,
                bundle_capacity_bytes: 1024,
            },
            retrieval: RetrievalConfig {
                max_workers: 2,
                network_timeout_secs: 5,
            },
        }
    }

    /// 3x1 RGBA8, not power of two: cost is exactly 12 bytes.
    fn small_pixels() -> ImageData {
        ImageData::solid_color(3, 1, [7, 8, 9, 255])
    }

    fn wait_for_redraw(signal: &RedrawSignal) {
        for _ in 0..500 {
            if signal.take() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("redraw was never requested");
    }

    struct CountingLocator {
        calls: AtomicUsize,
        gate: Mutex<mpsc::Receiver<()>>,
        bytes: Vec<u8>,
    }

    impl CountingLocator {
        fn gated() -> (Arc<Self>, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let locator = Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Mutex::new(rx),
                bytes: png_bytes(),
            });
            (locator, tx)
        }
    }

    impl AssetLocator for CountingLocator {
        fn read_asset(&self, _name: &str) -> std::io::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.lock().unwrap().recv();
            Ok(self.bytes.clone())
        }
    }

    fn png_bytes() -> Vec<u8> {
        use std::io::Cursor;
        let img = image::RgbaImage::from_pixel(3, 1, image::Rgba([7, 8, 9, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png encode");
        bytes
    }

    #[test]
    fn test_in_memory_pixels_cached_synchronously() {
        let mut cache = RenderResourceCache::new(&test_config(1024, 512)).unwrap();
        let source = ImageSource::from_pixels(small_pixels());

        let texture = cache.retrieve_texture(&source).expect("cached on the spot");
        assert_eq!((texture.width(), texture.height()), (3, 1));
        assert_eq!(cache.entry_count(), 1);

        // Second retrieval is a plain hit.
        assert!(cache.retrieve_texture(&source).is_some());
        assert_eq!(cache.stats().hits, 1);
        cache.shutdown();
    }

    #[test]
    fn test_round_trip_content_stable_until_bound() {
        let mut cache = RenderResourceCache::new(&test_config(1024, 512)).unwrap();
        let pixels = small_pixels();
        let expected = pixels.data.clone();
        let source = ImageSource::from_pixels(pixels);

        for _ in 0..3 {
            let texture = cache.retrieve_texture(&source).expect("resident");
            assert_eq!(texture.image().expect("pre-upload pixels").data, expected);
        }
        cache.shutdown();
    }

    #[test]
    fn test_eviction_defers_disposal_until_safe_point() {
        // Capacity fits two 12-byte textures but not three.
        let mut cache = RenderResourceCache::new(&test_config(30, 12)).unwrap();
        let mut device = RecordingDevice::new();

        let first = ImageSource::from_pixels(small_pixels());
        let second = ImageSource::from_pixels(small_pixels());
        let third = ImageSource::from_pixels(small_pixels());

        let handle_a = {
            let texture = cache.retrieve_texture(&first).expect("resident");
            assert!(texture.bind(&mut device, 0));
            texture.handle()
        };
        cache.retrieve_texture(&second);
        cache.retrieve_texture(&third); // 36 > 30: evicts down to 12

        assert!(cache.disposal_count() > 0);
        // Nothing destroyed yet: eviction is not disposal.
        assert!(device.destroyed_textures.is_empty());
        // The evicted handle is no longer resident.
        assert_eq!(cache.entry_count(), 1);

        cache.release_evicted_resources(&mut device);
        assert_eq!(device.destroy_count(handle_a), 1);
        assert!(!device.live_textures.contains(&handle_a.0));

        // A second pass has nothing left to release.
        cache.release_evicted_resources(&mut device);
        assert_eq!(device.destroy_count(handle_a), 1);
        cache.shutdown();
    }

    #[test]
    fn test_context_lost_never_double_releases() {
        let mut cache = RenderResourceCache::new(&test_config(30, 12)).unwrap();
        let mut device = RecordingDevice::new();

        let first = ImageSource::from_pixels(small_pixels());
        if let Some(texture) = cache.retrieve_texture(&first) {
            texture.bind(&mut device, 0);
        }
        cache.retrieve_texture(&ImageSource::from_pixels(small_pixels()));
        cache.retrieve_texture(&ImageSource::from_pixels(small_pixels()));
        assert!(cache.disposal_count() > 0);

        cache.context_lost();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.used_cost(), 0);
        assert_eq!(cache.disposal_count(), 0);
        assert_eq!(cache.pending_count(), 0);

        // The disposal queue was cleared, not populated: nothing to destroy.
        cache.release_evicted_resources(&mut device);
        assert!(device.destroyed_textures.is_empty());
        cache.shutdown();
    }

    #[test]
    fn test_single_flight_per_source() {
        let (locator, gate) = CountingLocator::gated();
        let mut cache =
            RenderResourceCache::with_asset_locator(&test_config(1024, 512), Some(locator.clone()))
                .unwrap();
        let source = ImageSource::asset("tiles/0/0/0.png");

        assert!(cache.retrieve_texture(&source).is_none());
        assert_eq!(cache.pending_count(), 1);

        // A second request for the same source before completion must not
        // submit another retrieval.
        assert!(cache.retrieve_texture(&source).is_none());
        assert_eq!(cache.pending_count(), 1);
        assert_eq!(cache.retriever().in_flight_count(), 1);

        gate.send(()).expect("release worker");
        let redraw = cache.redraw_signal();
        wait_for_redraw(&redraw);

        let texture = cache.retrieve_texture(&source).expect("promoted on drain");
        assert_eq!((texture.width(), texture.height()), (3, 1));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.pending_count(), 0);
        cache.shutdown();
    }

    #[test]
    fn test_failed_retrieval_clears_pending_and_counts() {
        let mut cache = RenderResourceCache::new(&test_config(1024, 512)).unwrap();
        let source = ImageSource::file("no/such/tile.png");

        assert!(cache.retrieve_texture(&source).is_none());
        assert_eq!(cache.pending_count(), 1);

        let redraw = cache.redraw_signal();
        wait_for_redraw(&redraw);

        // The drain retires the pending mark; the resource stays absent and
        // a fresh request may be issued (caller's choice, next frame).
        assert!(cache.retrieve_texture(&source).is_none());
        assert_eq!(cache.stats().retrieval_failures, 1);
        cache.shutdown();
    }

    #[test]
    fn test_text_texture_rasterized_once() {
        let mut cache = RenderResourceCache::new(&test_config(1024, 512)).unwrap();
        let key = TextKey {
            text: "Equator".to_string(),
            font_px: 16,
            color: [255, 255, 255, 255],
            outline: true,
        };

        assert!(cache
            .retrieve_text_texture(key.clone(), || ImageData::gray(6, 2, vec![0xFF; 12]))
            .is_some());

        // The second lookup must hit the cache, not rasterize again.
        let texture = cache
            .retrieve_text_texture(key, || panic!("rasterized twice"))
            .expect("resident");
        assert_eq!((texture.width(), texture.height()), (6, 2));
        cache.shutdown();
    }

    #[test]
    fn test_buffer_and_program_round_trip() {
        use crate::render::backend::BufferKind;

        let mut cache = RenderResourceCache::new(&test_config(1024, 512)).unwrap();
        cache.put_buffer(
            42,
            BufferObject::from_slice(BufferKind::Index, &[0u32, 1, 2]),
        );
        cache.put_program("terrain", ShaderProgram::from_sources("v", "f"));

        assert!(cache.buffer_mut(42).is_some());
        assert!(cache.buffer_mut(43).is_none());
        assert!(cache.program_mut("terrain").is_some());
        assert!(cache.program_mut("sky").is_none());
        cache.shutdown();
    }

    #[test]
    fn test_attribute_bundles_deduplicate() {
        let mut cache = RenderResourceCache::new(&test_config(1024, 512)).unwrap();
        let built = AtomicUsize::new(0);

        let first = cache.attribute_bundle("unit-quad", || {
            built.fetch_add(1, Ordering::SeqCst);
            vec![0u8; 32]
        });
        let second = cache.attribute_bundle("unit-quad", || {
            built.fetch_add(1, Ordering::SeqCst);
            vec![0u8; 32]
        });

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        cache.shutdown();
    }
}
