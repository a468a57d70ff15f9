//! Core emulator primitives and traits.

use serde_json::Value;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A monochrome framebuffer snapshot: one byte per pixel, 0 or 1.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u8>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }
    }
}

/// A CPU-like component that can be stepped.
///
/// One call executes one bounded unit of work (an instruction, a cycle)
/// and reports what happened. Faults are conditions the machine cannot
/// recover from on its own, such as a corrupted call stack.
pub trait Cpu {
    /// Per-step report (executed cycles, raised signals, ...).
    type Output;
    type Fault: std::error::Error + Send + Sync + 'static;

    fn reset(&mut self);
    fn step(&mut self) -> Result<Self::Output, Self::Fault>;
}

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "ROM", "BIOS")
    pub id: String,
    /// User-friendly name for display (e.g., "Program ROM")
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["ch8"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Return a JSON-serializable save state for debugging.
    /// Note: Save states should NOT include ROM/cartridge data.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    /// Returns error if the state is incompatible or requires different mounted media.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
