//! Graphics device abstraction
//!
//! Defines the trait a platform rendering backend must implement so the
//! resource cache and lifecycle objects can create, bind, and destroy native
//! GPU objects without knowing which graphics API sits underneath.

use thiserror::Error;

/// Errors reported by a graphics device implementation.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The driver refused to allocate a native object.
    #[error("GPU allocation failed: {0}")]
    AllocationFailed(String),

    /// Data upload into an existing native object failed.
    #[error("GPU upload failed: {0}")]
    UploadFailed(String),

    /// Shader source was rejected by the driver.
    #[error("shader compilation failed: {0}")]
    CompilationFailed(String),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Native, driver-allocated identifier for a GPU object.
///
/// Zero is reserved as the null handle; a released resource zeroes its handle
/// so stale uses are detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    /// The null handle.
    pub const NULL: Self = Self(0);

    /// Whether this handle is the null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Texel layout of a texture's pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per texel.
    Rgba8,
    /// 8-bit single channel, 1 byte per texel (glyph masks).
    Gray8,
}

impl PixelFormat {
    /// Bytes occupied by one texel in this format.
    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }
}

/// Immutable description of a texture's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: PixelFormat,
    /// Whether a mip chain is generated for this texture.
    pub mipmapped: bool,
}

/// The role a buffer object plays in draw submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute data.
    Vertex,
    /// Primitive index data.
    Index,
}

/// Backend trait implemented by a platform graphics context.
///
/// All methods are only ever invoked from the render thread that owns the
/// context. Creation returns an opaque [`NativeHandle`]; destruction is
/// infallible the way native delete calls are, so disposal of a long queue of
/// evicted resources can never be blocked by a single entry.
pub trait GraphicsDevice {
    /// Create a texture object and upload `pixels` into it.
    fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8])
        -> DeviceResult<NativeHandle>;

    /// Replace the contents of an existing texture of identical storage.
    fn update_texture(
        &mut self,
        handle: NativeHandle,
        desc: &TextureDescriptor,
        pixels: &[u8],
    ) -> DeviceResult<()>;

    /// Bind a texture to a texture unit for subsequent draws.
    fn bind_texture(&mut self, unit: u32, handle: NativeHandle);

    /// Destroy a texture object.
    fn destroy_texture(&mut self, handle: NativeHandle);

    /// Create a buffer object and upload `bytes` into it.
    fn create_buffer(&mut self, kind: BufferKind, bytes: &[u8]) -> DeviceResult<NativeHandle>;

    /// Bind a buffer for subsequent draws.
    fn bind_buffer(&mut self, kind: BufferKind, handle: NativeHandle);

    /// Destroy a buffer object.
    fn destroy_buffer(&mut self, handle: NativeHandle);

    /// Compile and link a shader program from its sources.
    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> DeviceResult<NativeHandle>;

    /// Make a program current for subsequent draws.
    fn use_program(&mut self, handle: NativeHandle);

    /// Destroy a shader program.
    fn destroy_program(&mut self, handle: NativeHandle);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(NativeHandle::NULL.is_null());
        assert!(!NativeHandle(7).is_null());
    }

    #[test]
    fn test_bytes_per_texel() {
        assert_eq!(PixelFormat::Rgba8.bytes_per_texel(), 4);
        assert_eq!(PixelFormat::Gray8.bytes_per_texel(), 1);
    }
}
