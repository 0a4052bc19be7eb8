//! Shader program lifecycle

use crate::render::backend::{GraphicsDevice, NativeHandle};
use crate::render::resources::ResourceState;

/// Vertex and fragment shader source text held until the first use.
#[derive(Debug, Clone)]
pub struct ProgramSources {
    /// Vertex stage source.
    pub vertex: String,
    /// Fragment stage source.
    pub fragment: String,
}

/// A shader program that compiles and links on first use.
#[derive(Debug)]
pub struct ShaderProgram {
    state: ResourceState,
    handle: NativeHandle,
    sources: Option<ProgramSources>,
    source_len: usize,
}

impl ShaderProgram {
    /// Wrap shader sources. No driver calls are made here.
    pub fn from_sources(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        let sources = ProgramSources {
            vertex: vertex.into(),
            fragment: fragment.into(),
        };
        let source_len = sources.vertex.len() + sources.fragment.len();
        Self {
            state: ResourceState::Unallocated,
            handle: NativeHandle::NULL,
            sources: Some(sources),
            source_len,
        }
    }

    /// Make this program current, compiling and linking it on first use.
    /// Returns `false` when the program is unavailable (compilation failed
    /// or the program was released).
    pub fn use_program(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        match self.state {
            ResourceState::Allocated => {
                device.use_program(self.handle);
                true
            }
            ResourceState::Unallocated => {
                let sources = match self.sources.take() {
                    Some(sources) => sources,
                    None => {
                        self.state = ResourceState::Released;
                        return false;
                    }
                };
                match device.create_program(&sources.vertex, &sources.fragment) {
                    Ok(handle) => {
                        self.handle = handle;
                        self.state = ResourceState::Allocated;
                        device.use_program(handle);
                        true
                    }
                    Err(e) => {
                        log::warn!("Shader program build failed: {e}");
                        self.state = ResourceState::Released;
                        self.handle = NativeHandle::NULL;
                        false
                    }
                }
            }
            ResourceState::Released => {
                log::error!("use_program called on a released program");
                debug_assert!(false, "use_program called on a released program");
                false
            }
        }
    }

    /// Destroy the native object and zero the handle.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        match self.state {
            ResourceState::Allocated => {
                device.destroy_program(self.handle);
                self.handle = NativeHandle::NULL;
                self.state = ResourceState::Released;
            }
            ResourceState::Unallocated => {
                self.sources = None;
                self.state = ResourceState::Released;
            }
            ResourceState::Released => {
                log::debug!("release on an already-released program");
            }
        }
    }

    /// Estimated cache cost in bytes. Programs are tiny next to textures;
    /// the source length keeps the accounting monotonic.
    pub fn estimated_cost(&self) -> usize {
        self.source_len.max(1)
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// The native handle, null until the first use.
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::testing::RecordingDevice;

    const VERT: &str = "void main() { gl_Position = vec4(0.0); }";
    const FRAG: &str = "void main() { }";

    #[test]
    fn test_first_use_compiles_and_drops_sources() {
        let mut device = RecordingDevice::new();
        let mut p = ShaderProgram::from_sources(VERT, FRAG);
        assert_eq!(p.state(), ResourceState::Unallocated);

        assert!(p.use_program(&mut device));
        assert_eq!(p.state(), ResourceState::Allocated);
        assert_eq!(device.live_programs.len(), 1);

        assert!(p.use_program(&mut device));
        assert_eq!(device.live_programs.len(), 1);
        assert_eq!(device.program_uses.len(), 2);
    }

    #[test]
    fn test_compile_failure_is_terminal() {
        let mut device = RecordingDevice::new();
        device.fail_program_create = true;
        let mut p = ShaderProgram::from_sources(VERT, FRAG);

        assert!(!p.use_program(&mut device));
        assert_eq!(p.state(), ResourceState::Released);
        assert!(p.handle().is_null());
    }

    #[test]
    fn test_release_lifecycle() {
        let mut device = RecordingDevice::new();
        let mut p = ShaderProgram::from_sources(VERT, FRAG);
        p.use_program(&mut device);
        let handle = p.handle();

        p.release(&mut device);
        assert_eq!(p.state(), ResourceState::Released);
        assert_eq!(device.destroy_count(handle), 1);
    }

    #[test]
    fn test_cost_is_positive_and_stable() {
        let p = ShaderProgram::from_sources(VERT, FRAG);
        let q = ShaderProgram::from_sources(VERT, FRAG);
        assert!(p.estimated_cost() > 0);
        assert_eq!(p.estimated_cost(), q.estimated_cost());
    }
}
