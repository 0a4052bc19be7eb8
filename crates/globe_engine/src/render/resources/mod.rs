//! GPU resource lifecycle objects
//!
//! Textures, buffer objects, and shader programs share one state machine:
//! Unallocated -> Allocated -> Released (terminal). Construction stores only
//! the CPU-side data; the native object is created lazily on first use and
//! the CPU copy is dropped once uploaded. A released resource is never
//! reallocated; callers construct a new instance instead.

pub mod buffer;
pub mod shader;
pub mod texture;

pub use buffer::BufferObject;
pub use shader::{ProgramSources, ShaderProgram};
pub use texture::Texture;

/// Lifecycle state shared by every GPU resource object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// CPU-side data held, no native object exists yet.
    Unallocated,
    /// Native object exists; CPU-side data has been dropped.
    Allocated,
    /// Terminal: native object destroyed or allocation failed. Any further
    /// operation is a logic error reported loudly, never a silent realloc.
    Released,
}
