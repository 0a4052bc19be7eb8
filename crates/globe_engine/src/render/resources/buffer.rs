//! GPU buffer object lifecycle

use crate::render::backend::{BufferKind, GraphicsDevice, NativeHandle};
use crate::render::resources::ResourceState;

/// A vertex or index buffer that allocates its native object on first bind.
///
/// The tessellator hands over raw bytes; the cache stores but never
/// interprets them.
#[derive(Debug)]
pub struct BufferObject {
    state: ResourceState,
    handle: NativeHandle,
    kind: BufferKind,
    /// Held until the first upload, then dropped.
    bytes: Option<Vec<u8>>,
    byte_len: usize,
}

impl BufferObject {
    /// Wrap raw buffer bytes. No driver calls are made here.
    pub fn from_bytes(kind: BufferKind, bytes: Vec<u8>) -> Self {
        let byte_len = bytes.len();
        Self {
            state: ResourceState::Unallocated,
            handle: NativeHandle::NULL,
            kind,
            bytes: Some(bytes),
            byte_len,
        }
    }

    /// Wrap a typed slice (vertex structs, u16/u32 indices) as buffer bytes.
    pub fn from_slice<T: bytemuck::Pod>(kind: BufferKind, data: &[T]) -> Self {
        Self::from_bytes(kind, bytemuck::cast_slice(data).to_vec())
    }

    /// Bind the buffer, creating and uploading the native object on first
    /// use. Returns `false` when the buffer is unavailable.
    pub fn bind(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        match self.state {
            ResourceState::Allocated => {
                device.bind_buffer(self.kind, self.handle);
                true
            }
            ResourceState::Unallocated => {
                let bytes = match self.bytes.take() {
                    Some(bytes) => bytes,
                    None => {
                        self.state = ResourceState::Released;
                        return false;
                    }
                };
                match device.create_buffer(self.kind, &bytes) {
                    Ok(handle) => {
                        self.handle = handle;
                        self.state = ResourceState::Allocated;
                        device.bind_buffer(self.kind, handle);
                        true
                    }
                    Err(e) => {
                        log::warn!("Buffer allocation failed ({} bytes): {e}", self.byte_len);
                        self.state = ResourceState::Released;
                        self.handle = NativeHandle::NULL;
                        false
                    }
                }
            }
            ResourceState::Released => {
                log::error!("bind called on a released buffer");
                debug_assert!(false, "bind called on a released buffer");
                false
            }
        }
    }

    /// Destroy the native object and zero the handle.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        match self.state {
            ResourceState::Allocated => {
                device.destroy_buffer(self.handle);
                self.handle = NativeHandle::NULL;
                self.state = ResourceState::Released;
            }
            ResourceState::Unallocated => {
                self.bytes = None;
                self.state = ResourceState::Released;
            }
            ResourceState::Released => {
                log::debug!("release on an already-released buffer");
            }
        }
    }

    /// Byte length of the buffer data; survives the upload for capacity
    /// accounting.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Estimated GPU memory footprint in bytes.
    pub fn estimated_cost(&self) -> usize {
        self.byte_len
    }

    /// The buffer's role.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// The native handle, null until the first bind.
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::testing::RecordingDevice;

    #[test]
    fn test_typed_slice_becomes_bytes() {
        let indices: [u32; 3] = [0, 1, 2];
        let b = BufferObject::from_slice(BufferKind::Index, &indices);
        assert_eq!(b.byte_len(), 12);
        assert_eq!(b.estimated_cost(), 12);
        assert_eq!(b.kind(), BufferKind::Index);
        assert_eq!(b.state(), ResourceState::Unallocated);
    }

    #[test]
    fn test_first_bind_uploads_then_binds_cheaply() {
        let mut device = RecordingDevice::new();
        let mut b = BufferObject::from_bytes(BufferKind::Vertex, vec![0u8; 64]);

        assert!(b.bind(&mut device));
        assert_eq!(b.state(), ResourceState::Allocated);
        assert_eq!(device.live_buffers.len(), 1);

        assert!(b.bind(&mut device));
        assert_eq!(device.live_buffers.len(), 1);
        assert_eq!(device.buffer_binds.len(), 2);
        // Cost accounting survives dropping the CPU copy.
        assert_eq!(b.byte_len(), 64);
    }

    #[test]
    fn test_failed_allocation_reports_unavailable() {
        let mut device = RecordingDevice::new();
        device.fail_buffer_create = true;
        let mut b = BufferObject::from_bytes(BufferKind::Vertex, vec![0u8; 8]);

        assert!(!b.bind(&mut device));
        assert_eq!(b.state(), ResourceState::Released);
    }

    #[test]
    fn test_release_destroys_once() {
        let mut device = RecordingDevice::new();
        let mut b = BufferObject::from_bytes(BufferKind::Index, vec![0u8; 8]);
        b.bind(&mut device);
        let handle = b.handle();

        b.release(&mut device);
        assert_eq!(device.destroy_count(handle), 1);
        assert!(b.handle().is_null());

        // Disposal tolerates an already-released buffer.
        b.release(&mut device);
        assert_eq!(device.destroy_count(handle), 1);
    }
}
