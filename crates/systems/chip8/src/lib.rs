//! CHIP-8 / SuperChip-8 system implementation
//!
//! The machine core lives in [`cpu`]; this crate root wires it into the
//! [`emu_core::System`] surface: ROM mounting with the 3583-byte limit,
//! reset that reloads the mounted ROM, JSON save states and per-frame
//! stepping. The host owns pacing and input: it pushes key state with
//! [`Chip8System::set_key`] between steps and reads the framebuffer and
//! status flags afterwards.

mod cpu;
mod font;
mod framebuffer;
mod instruction;

pub use cpu::{Chip8Cpu, CpuFault, StepResult, MAX_ROM_SIZE, MEMORY_SIZE, PROGRAM_START};
pub use framebuffer::Framebuffer;
pub use instruction::Instruction;

use emu_core::{types::Frame, MountPointInfo, System};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("ROM too large: {0} bytes (limit {MAX_ROM_SIZE})")]
    RomTooLarge(usize),
    #[error("No ROM mounted")]
    NoRom,
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error(transparent)]
    Fault(#[from] CpuFault),
}

/// Cycles executed per host frame. The timers tick once per cycle, so
/// at a 60 Hz host loop this runs the machine at ~540 instructions per
/// second with ~9 timer decrements per frame.
const CYCLES_PER_FRAME: u32 = 9;

/// CHIP-8 / SuperChip-8 system
pub struct Chip8System {
    pub cpu: Chip8Cpu,
    /// Last mounted program image, replayed by reset.
    rom: Option<Vec<u8>>,
    cycles: u64,
}

impl Default for Chip8System {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip8System {
    pub fn new() -> Self {
        Self {
            cpu: Chip8Cpu::new(),
            rom: None,
            cycles: 0,
        }
    }

    /// Execute a single machine cycle.
    pub fn step(&mut self) -> Result<StepResult, Chip8Error> {
        if self.rom.is_none() {
            return Err(Chip8Error::NoRom);
        }
        let result = self.cpu.step()?;
        self.cycles += 1;
        Ok(result)
    }

    /// Mark key `k` (0-15) as the sole pressed key.
    pub fn set_key(&mut self, k: u8) {
        self.cpu.set_key(k);
    }

    pub fn clear_keys(&mut self) {
        self.cpu.clear_keys();
    }

    /// Snapshot of the active display region.
    pub fn framebuffer(&self) -> Frame {
        self.cpu.framebuffer.snapshot()
    }

    pub fn extended_mode(&self) -> bool {
        self.cpu.framebuffer.hires()
    }

    pub fn exit_requested(&self) -> bool {
        self.cpu.exit_requested
    }

    pub fn awaiting_key(&self) -> bool {
        self.cpu.awaiting_key
    }

    /// Toggle the per-cycle opcode trace. Survives reset.
    pub fn set_debug(&mut self, debug: bool) {
        self.cpu.debug = debug;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl System for Chip8System {
    type Error = Chip8Error;

    /// Power-cycle the machine and reload the mounted ROM. Only the
    /// debug flag survives.
    fn reset(&mut self) {
        let debug = self.cpu.debug;
        self.cpu.reset();
        if let Some(rom) = &self.rom {
            self.cpu.load_rom(rom);
        }
        self.cpu.debug = debug;
        self.cycles = 0;
    }

    /// Run one host frame's worth of cycles and return the display.
    ///
    /// Stops early once an exit instruction has executed; a machine
    /// fault aborts the frame.
    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if self.rom.is_none() {
            return Err(Chip8Error::NoRom);
        }
        for _ in 0..CYCLES_PER_FRAME {
            let result = self.cpu.step()?;
            self.cycles += 1;
            if result.exit_requested {
                break;
            }
        }
        Ok(self.cpu.framebuffer.snapshot())
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": 1,
            "system": "chip8",
            "cycles": self.cycles,
            "cpu": self.cpu,
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != 1 {
            return Err(serde_json::from_str::<()>("invalid").unwrap_err());
        }

        let system = v["system"].as_str().unwrap_or("");
        if system != "chip8" {
            return Err(serde_json::from_str::<()>("invalid").unwrap_err());
        }

        self.cycles = v["cycles"].as_u64().unwrap_or(0);

        if let Some(cpu_value) = v.get("cpu") {
            self.cpu = serde_json::from_value(cpu_value.clone())?;
        }

        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: "ROM".to_string(),
            name: "Program ROM".to_string(),
            extensions: vec!["ch8".to_string(), "c8".to_string(), "sc8".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != "ROM" {
            return Err(Chip8Error::InvalidMountPoint(mount_point_id.to_string()));
        }
        if data.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomTooLarge(data.len()));
        }

        self.rom = Some(data.to_vec());
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != "ROM" {
            return Err(Chip8Error::InvalidMountPoint(mount_point_id.to_string()));
        }

        self.rom = None;
        self.reset();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == "ROM" && self.rom.is_some()
    }
}
