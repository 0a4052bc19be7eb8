//! Rendering core
//!
//! Device abstraction, GPU resource lifecycle objects, the per-frame ordered
//! renderable queue, and the frame controller that ties them together.

pub mod backend;
pub mod frame;
pub mod ordered_queue;
pub mod resources;

pub use backend::{
    BufferKind, DeviceError, DeviceResult, GraphicsDevice, NativeHandle, PixelFormat,
    TextureDescriptor,
};
pub use frame::{DrawContext, FrameController, Layer, RedrawSignal, Renderable};
pub use ordered_queue::OrderedRenderableQueue;
pub use resources::{BufferObject, ProgramSources, ResourceState, ShaderProgram, Texture};
