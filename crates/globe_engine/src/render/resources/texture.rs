//! GPU texture lifecycle

use crate::render::backend::{GraphicsDevice, NativeHandle, PixelFormat, TextureDescriptor};
use crate::render::resources::ResourceState;
use crate::retrieve::ImageData;

/// Mip chain overhead applied to the byte-cost estimate of mipmapped
/// textures, as a rational factor. The exact value is a tuning constant, not
/// measured GPU memory; what matters is that equal dimensions and format
/// always estimate to the same cost.
const MIP_CHAIN_COST_NUM: usize = 4;
const MIP_CHAIN_COST_DEN: usize = 3;

/// A 2D texture that allocates its native object on first bind.
#[derive(Debug)]
pub struct Texture {
    state: ResourceState,
    handle: NativeHandle,
    descriptor: TextureDescriptor,
    /// Held until the first upload, then dropped to avoid double residency.
    image: Option<ImageData>,
}

impl Texture {
    /// Wrap decoded pixels. No driver calls are made here.
    pub fn from_image(image: ImageData) -> Self {
        let descriptor = Self::descriptor_for(&image);
        Self {
            state: ResourceState::Unallocated,
            handle: NativeHandle::NULL,
            descriptor,
            image: Some(image),
        }
    }

    fn descriptor_for(image: &ImageData) -> TextureDescriptor {
        TextureDescriptor {
            width: image.width,
            height: image.height,
            format: image.format,
            // Mip chains only for power-of-two images, matching the upload
            // path a tiled globe uses for its imagery.
            mipmapped: image.is_power_of_two(),
        }
    }

    /// Estimated GPU memory footprint in bytes for a texture of the given
    /// storage. Deterministic for equal descriptors so LRU accounting is
    /// stable across frames.
    pub fn estimate_cost(descriptor: &TextureDescriptor) -> usize {
        let base = (descriptor.width as usize)
            * (descriptor.height as usize)
            * descriptor.format.bytes_per_texel();
        if descriptor.mipmapped {
            base * MIP_CHAIN_COST_NUM / MIP_CHAIN_COST_DEN
        } else {
            base
        }
    }

    /// This texture's estimated byte cost.
    pub fn estimated_cost(&self) -> usize {
        Self::estimate_cost(&self.descriptor)
    }

    /// Bind the texture to `unit`, creating and uploading the native object
    /// on first use. Returns `false` when the texture is unavailable (not
    /// yet allocated and allocation failed, or already released); the caller
    /// skips the renderable for this frame.
    pub fn bind(&mut self, device: &mut dyn GraphicsDevice, unit: u32) -> bool {
        match self.state {
            ResourceState::Allocated => {
                device.bind_texture(unit, self.handle);
                true
            }
            ResourceState::Unallocated => {
                let image = match self.image.take() {
                    Some(image) => image,
                    None => {
                        // Unreachable by construction, but fail closed.
                        self.state = ResourceState::Released;
                        return false;
                    }
                };
                match device.create_texture(&self.descriptor, &image.data) {
                    Ok(handle) => {
                        self.handle = handle;
                        self.state = ResourceState::Allocated;
                        device.bind_texture(unit, handle);
                        true
                    }
                    Err(e) => {
                        log::warn!(
                            "Texture allocation failed ({}x{}): {e}",
                            self.descriptor.width,
                            self.descriptor.height
                        );
                        // Future binds consistently report unavailable
                        // instead of retrying a doomed upload every frame.
                        self.state = ResourceState::Released;
                        self.handle = NativeHandle::NULL;
                        false
                    }
                }
            }
            ResourceState::Released => {
                log::error!("bind called on a released texture");
                debug_assert!(false, "bind called on a released texture");
                false
            }
        }
    }

    /// Replace the texture contents.
    ///
    /// While allocated, identical storage is updated in place; changed
    /// dimensions or format force a full re-specification (destroy and
    /// recreate) rather than an incremental update.
    pub fn set_image(&mut self, device: &mut dyn GraphicsDevice, image: ImageData) {
        match self.state {
            ResourceState::Unallocated => {
                self.descriptor = Self::descriptor_for(&image);
                self.image = Some(image);
            }
            ResourceState::Allocated => {
                let descriptor = Self::descriptor_for(&image);
                if descriptor == self.descriptor {
                    if let Err(e) = device.update_texture(self.handle, &descriptor, &image.data) {
                        log::warn!("Texture update failed: {e}");
                        device.destroy_texture(self.handle);
                        self.handle = NativeHandle::NULL;
                        self.state = ResourceState::Released;
                    }
                } else {
                    device.destroy_texture(self.handle);
                    match device.create_texture(&descriptor, &image.data) {
                        Ok(handle) => {
                            self.handle = handle;
                            self.descriptor = descriptor;
                        }
                        Err(e) => {
                            log::warn!("Texture re-specification failed: {e}");
                            self.handle = NativeHandle::NULL;
                            self.state = ResourceState::Released;
                        }
                    }
                }
            }
            ResourceState::Released => {
                log::error!("set_image called on a released texture");
                debug_assert!(false, "set_image called on a released texture");
            }
        }
    }

    /// Destroy the native object and zero the handle. A release before the
    /// first bind is a no-op; a second release is a logic error.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        match self.state {
            ResourceState::Allocated => {
                device.destroy_texture(self.handle);
                self.handle = NativeHandle::NULL;
                self.state = ResourceState::Released;
            }
            ResourceState::Unallocated => {
                // Nothing was ever created; drop the CPU copy.
                self.image = None;
                self.state = ResourceState::Released;
            }
            ResourceState::Released => {
                // Tolerated: a texture whose allocation failed is already in
                // the released state when the disposal queue gets to it.
                log::debug!("release on an already-released texture");
            }
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// The native handle, null until the first bind.
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// The texture's storage description.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// The CPU-side pixels, present only before the first upload.
    pub fn image(&self) -> Option<&ImageData> {
        self.image.as_ref()
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }
}
