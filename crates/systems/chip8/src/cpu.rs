//! CHIP-8 / SuperChip-8 machine core.
//!
//! One [`Chip8Cpu::step`] call is one full cycle: fetch the word at pc,
//! decode it, execute exactly one instruction, then tick both timers.
//! Timers keep ticking while the machine sits on an FX0A waiting for a
//! key; timing-sensitive programs depend on that.

use crate::font::{
    BIG_FONT_BASE, BIG_FONT_GLYPH_SIZE, BIG_FONT_SPRITES, FONT_BASE, FONT_GLYPH_SIZE, FONT_SPRITES,
};
use crate::framebuffer::Framebuffer;
use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Addressable memory size in bytes.
pub const MEMORY_SIZE: usize = 4096;

/// Programs load at this offset; everything below it is interpreter
/// reserved (font tables).
pub const PROGRAM_START: u16 = 0x200;

/// Largest ROM that fits between [`PROGRAM_START`] and the end of the
/// 12-bit address space.
pub const MAX_ROM_SIZE: usize = 0x0FFF - PROGRAM_START as usize;

const STACK_DEPTH: usize = 16;
const NUM_KEYS: usize = 16;

/// Conditions the machine cannot recover from on its own. The original
/// interpreter left these unguarded; here a faulting step fails fast
/// and leaves the state untouched for inspection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuFault {
    #[error("call stack overflow at pc {pc:#05X}")]
    StackOverflow { pc: u16 },
    #[error("return with empty call stack at pc {pc:#05X}")]
    StackUnderflow { pc: u16 },
    #[error("program counter {pc:#05X} outside addressable memory")]
    PcOutOfRange { pc: u16 },
}

/// What one cycle did, as seen from the host.
///
/// `drew` and `beeped` are one-shot signals for this cycle only;
/// `exit_requested` and `awaiting_key` mirror the persistent machine
/// state after the cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepResult {
    /// The framebuffer changed (draw, clear, scroll or mode switch).
    pub drew: bool,
    /// The sound timer hit zero this cycle.
    pub beeped: bool,
    /// An exit instruction has been executed; the host should stop.
    pub exit_requested: bool,
    /// The machine is parked on an FX0A until a key is asserted.
    pub awaiting_key: bool,
}

/// Complete interpreter state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chip8Cpu {
    /// General purpose registers V0-VF. VF doubles as the
    /// carry/borrow/collision flag.
    pub v: [u8; 16],
    /// Index register.
    pub i: u16,
    /// Program counter.
    pub pc: u16,
    /// Return address stack and stack pointer.
    pub stack: [u16; STACK_DEPTH],
    pub sp: u8,
    /// 4KB address space: fonts below 0x200, program from 0x200.
    pub memory: Vec<u8>,
    pub delay_timer: u8,
    pub sound_timer: u8,
    /// Key-pressed flags. At most one is set at a time; asserting a key
    /// clears the others first.
    pub keys: [bool; NUM_KEYS],
    /// SuperChip RPL user flag bank (FX75/FX85).
    pub rpl: [u8; 8],
    pub framebuffer: Framebuffer,
    /// Set by the exit instruction, never cleared by the machine.
    pub exit_requested: bool,
    /// Set while an FX0A has found no pressed key.
    pub awaiting_key: bool,
    /// Log every executed opcode at debug level.
    pub debug: bool,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        let mut cpu = Self {
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            stack: [0; STACK_DEPTH],
            sp: 0,
            memory: vec![0; MEMORY_SIZE],
            delay_timer: 0,
            sound_timer: 0,
            keys: [false; NUM_KEYS],
            rpl: [0; 8],
            framebuffer: Framebuffer::new(),
            exit_requested: false,
            awaiting_key: false,
            debug: false,
        };
        cpu.load_fonts();
        cpu
    }

    /// Reset every piece of machine state to power-on, including the
    /// debug flag. Callers that want the debug flag to survive (system
    /// reset does) save and restore it around this call.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Copy a program image to [`PROGRAM_START`]. The caller validates
    /// the size; see [`MAX_ROM_SIZE`].
    pub fn load_rom(&mut self, rom: &[u8]) {
        debug_assert!(rom.len() <= MAX_ROM_SIZE);
        let start = PROGRAM_START as usize;
        self.memory[start..start + rom.len()].copy_from_slice(rom);
    }

    fn load_fonts(&mut self) {
        let base = FONT_BASE as usize;
        self.memory[base..base + FONT_SPRITES.len()].copy_from_slice(&FONT_SPRITES);
        let base = BIG_FONT_BASE as usize;
        self.memory[base..base + BIG_FONT_SPRITES.len()].copy_from_slice(&BIG_FONT_SPRITES);
    }

    /// Mark key `k` as the sole pressed key. Out-of-range keys are
    /// ignored.
    pub fn set_key(&mut self, k: u8) {
        if k as usize >= NUM_KEYS {
            return;
        }
        self.keys = [false; NUM_KEYS];
        self.keys[k as usize] = true;
    }

    pub fn clear_keys(&mut self) {
        self.keys = [false; NUM_KEYS];
    }

    /// Run one fetch/decode/execute cycle and tick the timers.
    pub fn step(&mut self) -> Result<StepResult, CpuFault> {
        let word = self.fetch()?;
        let instruction = Instruction::decode(word);
        if self.debug {
            log::debug!("{:03X}: {:04X}  {}", self.pc, word, instruction);
        }

        let mut result = StepResult::default();
        self.execute(instruction, &mut result)?;

        // Timers tick unconditionally, even while parked on FX0A.
        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }
        if self.sound_timer > 0 {
            if self.sound_timer == 1 {
                result.beeped = true;
            }
            self.sound_timer -= 1;
        }

        result.exit_requested = self.exit_requested;
        result.awaiting_key = self.awaiting_key;
        Ok(result)
    }

    /// Read the 16-bit big-endian instruction word at pc.
    fn fetch(&self) -> Result<u16, CpuFault> {
        let pc = self.pc as usize;
        if pc + 1 >= MEMORY_SIZE {
            return Err(CpuFault::PcOutOfRange { pc: self.pc });
        }
        Ok((self.memory[pc] as u16) << 8 | self.memory[pc + 1] as u16)
    }

    /// Memory access through the index register wraps to the 12-bit
    /// address space.
    fn read_mem(&self, addr: u16) -> u8 {
        self.memory[(addr as usize) & (MEMORY_SIZE - 1)]
    }

    fn write_mem(&mut self, addr: u16, val: u8) {
        self.memory[(addr as usize) & (MEMORY_SIZE - 1)] = val;
    }

    fn execute(&mut self, instruction: Instruction, result: &mut StepResult) -> Result<(), CpuFault> {
        use Instruction::*;

        match instruction {
            ClearScreen => {
                self.framebuffer.clear();
                result.drew = true;
                self.pc += 2;
            }
            Return => {
                if self.sp == 0 {
                    return Err(CpuFault::StackUnderflow { pc: self.pc });
                }
                self.sp -= 1;
                self.pc = self.stack[self.sp as usize] + 2;
            }
            ScrollDown(n) => {
                self.framebuffer.scroll_down(n);
                result.drew = true;
                self.pc += 2;
            }
            ScrollRight => {
                self.framebuffer.scroll_right();
                result.drew = true;
                self.pc += 2;
            }
            ScrollLeft => {
                self.framebuffer.scroll_left();
                result.drew = true;
                self.pc += 2;
            }
            Exit => {
                self.exit_requested = true;
                self.pc += 2;
            }
            LoRes => {
                self.framebuffer.set_hires(false);
                result.drew = true;
                self.pc += 2;
            }
            HiRes => {
                self.framebuffer.set_hires(true);
                result.drew = true;
                self.pc += 2;
            }
            Jump(nnn) => self.pc = nnn,
            Call(nnn) => {
                if self.sp as usize == STACK_DEPTH {
                    return Err(CpuFault::StackOverflow { pc: self.pc });
                }
                // the pre-increment pc is pushed; Return adds the 2
                self.stack[self.sp as usize] = self.pc;
                self.sp += 1;
                self.pc = nnn;
            }
            SkipEqImm { x, nn } => {
                self.pc += if self.v[x as usize] == nn { 4 } else { 2 };
            }
            SkipNeImm { x, nn } => {
                self.pc += if self.v[x as usize] != nn { 4 } else { 2 };
            }
            SkipEqReg { x, y } => {
                self.pc += if self.v[x as usize] == self.v[y as usize] { 4 } else { 2 };
            }
            LoadImm { x, nn } => {
                self.v[x as usize] = nn;
                self.pc += 2;
            }
            AddImm { x, nn } => {
                self.v[x as usize] = self.v[x as usize].wrapping_add(nn);
                self.pc += 2;
            }
            Move { x, y } => {
                self.v[x as usize] = self.v[y as usize];
                self.pc += 2;
            }
            Or { x, y } => {
                self.v[x as usize] |= self.v[y as usize];
                self.pc += 2;
            }
            And { x, y } => {
                self.v[x as usize] &= self.v[y as usize];
                self.pc += 2;
            }
            Xor { x, y } => {
                self.v[x as usize] ^= self.v[y as usize];
                self.pc += 2;
            }
            Add { x, y } => {
                // flag first, then the sum reads VX back (matters when
                // X or Y is F)
                self.v[0xF] = (self.v[y as usize] > 0xFF - self.v[x as usize]) as u8;
                self.v[x as usize] = self.v[x as usize].wrapping_add(self.v[y as usize]);
                self.pc += 2;
            }
            Sub { x, y } => {
                self.v[0xF] = (self.v[x as usize] >= self.v[y as usize]) as u8;
                self.v[x as usize] = self.v[x as usize].wrapping_sub(self.v[y as usize]);
                self.pc += 2;
            }
            ShiftRight { x } => {
                self.v[0xF] = self.v[x as usize] & 0x1;
                self.v[x as usize] >>= 1;
                self.pc += 2;
            }
            SubReversed { x, y } => {
                self.v[0xF] = (self.v[y as usize] >= self.v[x as usize]) as u8;
                self.v[x as usize] = self.v[y as usize].wrapping_sub(self.v[x as usize]);
                self.pc += 2;
            }
            ShiftLeft { x } => {
                self.v[0xF] = self.v[x as usize] >> 7;
                self.v[x as usize] <<= 1;
                self.pc += 2;
            }
            SkipNeReg { x, y } => {
                self.pc += if self.v[x as usize] != self.v[y as usize] { 4 } else { 2 };
            }
            LoadIndex(nnn) => {
                self.i = nnn;
                self.pc += 2;
            }
            JumpOffset(nnn) => {
                self.pc = nnn + self.v[0] as u16;
            }
            Random { x, nn } => {
                self.v[x as usize] = rand::random::<u8>() & nn;
                self.pc += 2;
            }
            Draw { x, y, n } => {
                let wide = self.framebuffer.hires() && n == 0;
                let height = if n == 0 { 16 } else { n as usize };
                let mut rows = [0u16; 16];
                for (row, bits) in rows.iter_mut().take(height).enumerate() {
                    // I may sit anywhere in u16 range (FX1E never masks
                    // it), so effective addresses wrap before the
                    // 12-bit mask applies
                    *bits = if wide {
                        let addr = self.i.wrapping_add(row as u16 * 2);
                        (self.read_mem(addr) as u16) << 8
                            | self.read_mem(addr.wrapping_add(1)) as u16
                    } else {
                        self.read_mem(self.i.wrapping_add(row as u16)) as u16
                    };
                }
                let collision =
                    self.framebuffer
                        .draw(self.v[x as usize], self.v[y as usize], &rows[..height], wide);
                self.v[0xF] = collision as u8;
                result.drew = true;
                self.pc += 2;
            }
            SkipKeyPressed(x) => {
                let k = (self.v[x as usize] & 0xF) as usize;
                self.pc += if self.keys[k] { 4 } else { 2 };
                // testing the key consumes it
                self.keys[k] = false;
            }
            SkipKeyNotPressed(x) => {
                let k = (self.v[x as usize] & 0xF) as usize;
                self.pc += if self.keys[k] { 2 } else { 4 };
            }
            LoadDelay(x) => {
                self.v[x as usize] = self.delay_timer;
                self.pc += 2;
            }
            WaitKey(x) => {
                match self.keys.iter().position(|&pressed| pressed) {
                    Some(k) => {
                        self.v[x as usize] = k as u8;
                        self.clear_keys();
                        self.awaiting_key = false;
                        self.pc += 2;
                    }
                    // pc stays put so the same FX0A refetches next cycle
                    None => self.awaiting_key = true,
                }
            }
            SetDelay(x) => {
                self.delay_timer = self.v[x as usize];
                self.pc += 2;
            }
            SetSound(x) => {
                self.sound_timer = self.v[x as usize];
                self.pc += 2;
            }
            AddIndex(x) => {
                self.i = self.i.wrapping_add(self.v[x as usize] as u16);
                // SuperChip convention: flag on 12-bit overflow, I
                // itself is not wrapped and the flag is never cleared
                if self.i > 0x0FFF {
                    self.v[0xF] = 1;
                }
                self.pc += 2;
            }
            LoadFont(x) => {
                self.i = FONT_BASE + self.v[x as usize] as u16 * FONT_GLYPH_SIZE;
                self.pc += 2;
            }
            LoadBigFont(x) => {
                self.i = BIG_FONT_BASE + self.v[x as usize] as u16 * BIG_FONT_GLYPH_SIZE;
                self.pc += 2;
            }
            StoreBcd(x) => {
                let val = self.v[x as usize];
                self.write_mem(self.i, val / 100);
                self.write_mem(self.i.wrapping_add(1), (val / 10) % 10);
                self.write_mem(self.i.wrapping_add(2), val % 10);
                self.pc += 2;
            }
            StoreRegisters(x) => {
                for reg in 0..=x as u16 {
                    self.write_mem(self.i.wrapping_add(reg), self.v[reg as usize]);
                }
                self.pc += 2;
            }
            LoadRegisters(x) => {
                for reg in 0..=x as u16 {
                    self.v[reg as usize] = self.read_mem(self.i.wrapping_add(reg));
                }
                self.pc += 2;
            }
            StoreFlags(x) => {
                let last = x.min(7) as usize;
                self.rpl[..=last].copy_from_slice(&self.v[..=last]);
                self.pc += 2;
            }
            LoadFlags(x) => {
                let last = x.min(7) as usize;
                self.v[..=last].copy_from_slice(&self.rpl[..=last]);
                self.pc += 2;
            }
            LoadIndexByte(nn) => {
                self.i = nn as u16;
                self.pc += 2;
            }
            Unknown(word) => {
                log::warn!("unknown opcode {:04X} at pc {:03X}", word, self.pc);
                self.pc += 2;
            }
        }
        Ok(())
    }
}

impl emu_core::Cpu for Chip8Cpu {
    type Output = StepResult;
    type Fault = CpuFault;

    fn reset(&mut self) {
        Chip8Cpu::reset(self);
    }

    fn step(&mut self) -> Result<StepResult, CpuFault> {
        Chip8Cpu::step(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A cpu with the given words assembled at 0x200.
    fn cpu_with_program(words: &[u16]) -> Chip8Cpu {
        let mut rom = Vec::with_capacity(words.len() * 2);
        for w in words {
            rom.extend_from_slice(&w.to_be_bytes());
        }
        let mut cpu = Chip8Cpu::new();
        cpu.load_rom(&rom);
        cpu
    }

    #[test]
    fn test_power_on_state() {
        let cpu = Chip8Cpu::new();
        assert_eq!(cpu.pc, PROGRAM_START);
        assert_eq!(cpu.sp, 0);
        assert_eq!(cpu.i, 0);
        assert_eq!(&cpu.memory[0..5], &FONT_SPRITES[0..5]);
        assert_eq!(&cpu.memory[0x50..0x5A], &BIG_FONT_SPRITES[0..10]);
        assert!(!cpu.exit_requested);
    }

    #[test]
    fn test_clear_screen() {
        let mut cpu = cpu_with_program(&[0x00E0]);
        cpu.framebuffer.set(3, 3);
        let r = cpu.step().unwrap();
        assert!(r.drew);
        assert!(cpu.framebuffer.snapshot().pixels.iter().all(|&p| p == 0));
        assert_eq!(cpu.pc, 0x202);
    }

    #[test]
    fn test_jump_and_call_and_return() {
        let mut cpu = cpu_with_program(&[0x2206, 0x0000, 0x0000, 0x00EE]);
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x206);
        assert_eq!(cpu.sp, 1);
        assert_eq!(cpu.stack[0], 0x200);
        cpu.step().unwrap();
        // return lands just past the call
        assert_eq!(cpu.pc, 0x202);
        assert_eq!(cpu.sp, 0);
    }

    #[test]
    fn test_stack_overflow_faults() {
        // 2200: call self forever
        let mut cpu = cpu_with_program(&[0x2200]);
        for _ in 0..16 {
            cpu.step().unwrap();
        }
        assert_eq!(
            cpu.step(),
            Err(CpuFault::StackOverflow { pc: 0x200 })
        );
        // state is preserved for inspection
        assert_eq!(cpu.sp, 16);
        assert_eq!(cpu.pc, 0x200);
    }

    #[test]
    fn test_stack_underflow_faults() {
        let mut cpu = cpu_with_program(&[0x00EE]);
        assert_eq!(
            cpu.step(),
            Err(CpuFault::StackUnderflow { pc: 0x200 })
        );
    }

    #[test]
    fn test_fetch_out_of_range_faults() {
        let mut cpu = Chip8Cpu::new();
        cpu.pc = 4095;
        assert_eq!(
            cpu.step(),
            Err(CpuFault::PcOutOfRange { pc: 4095 })
        );
    }

    #[test]
    fn test_conditional_skips() {
        // V0 = 5; skip taken (3X05), then not taken (3X06)
        let mut cpu = cpu_with_program(&[0x6005, 0x3005, 0x0000, 0x3006]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x206);
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x208);
    }

    #[test]
    fn test_register_skip_uses_both_registers() {
        let mut cpu = cpu_with_program(&[0x9120]);
        cpu.v[1] = 7;
        cpu.v[2] = 7;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x202);

        let mut cpu = cpu_with_program(&[0x9120]);
        cpu.v[1] = 7;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x204);
    }

    #[test]
    fn test_immediate_add_wraps_without_flag() {
        let mut cpu = cpu_with_program(&[0x6005, 0x7003]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 8);
        assert_eq!(cpu.pc, 0x204);

        let mut cpu = cpu_with_program(&[0x60FF, 0x7002]);
        cpu.v[0xF] = 0;
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 1);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn test_add_sets_carry() {
        let mut cpu = cpu_with_program(&[0x8014]);
        cpu.v[0] = 0xFF;
        cpu.v[1] = 0x01;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0x00);
        assert_eq!(cpu.v[0xF], 1);
    }

    #[test]
    fn test_add_clears_carry() {
        let mut cpu = cpu_with_program(&[0x8014]);
        cpu.v[0] = 0x10;
        cpu.v[1] = 0x01;
        cpu.v[0xF] = 1;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0x11);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn test_sub_borrow() {
        let mut cpu = cpu_with_program(&[0x8015]);
        cpu.v[0] = 0x05;
        cpu.v[1] = 0x0A;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0xFB);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn test_sub_no_borrow() {
        let mut cpu = cpu_with_program(&[0x8015]);
        cpu.v[0] = 0x0A;
        cpu.v[1] = 0x05;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0x05);
        assert_eq!(cpu.v[0xF], 1);
    }

    #[test]
    fn test_sub_reversed() {
        let mut cpu = cpu_with_program(&[0x8017]);
        cpu.v[0] = 0x05;
        cpu.v[1] = 0x0A;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0x05);
        assert_eq!(cpu.v[0xF], 1);
    }

    #[test]
    fn test_shifts_capture_shifted_bit() {
        let mut cpu = cpu_with_program(&[0x8006]);
        cpu.v[0] = 0b0000_0101;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0b0000_0010);
        assert_eq!(cpu.v[0xF], 1);

        let mut cpu = cpu_with_program(&[0x800E]);
        cpu.v[0] = 0b1000_0001;
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0b0000_0010);
        assert_eq!(cpu.v[0xF], 1);
    }

    #[test]
    fn test_jump_offset() {
        let mut cpu = cpu_with_program(&[0xB210]);
        cpu.v[0] = 4;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x214);
    }

    #[test]
    fn test_random_respects_mask() {
        let mut cpu = cpu_with_program(&[0xC00F, 0xC100]);
        cpu.step().unwrap();
        assert_eq!(cpu.v[0] & 0xF0, 0);
        cpu.step().unwrap();
        assert_eq!(cpu.v[1], 0);
    }

    #[test]
    fn test_draw_collision_round_trip() {
        // 8x5 digit sprite drawn twice at the same spot xors itself off
        let mut cpu = cpu_with_program(&[0xF029, 0xD015, 0xD015]);
        cpu.step().unwrap();
        assert_eq!(cpu.i, FONT_BASE);
        let r = cpu.step().unwrap();
        assert!(r.drew);
        assert_eq!(cpu.v[0xF], 0);
        cpu.step().unwrap();
        assert_eq!(cpu.v[0xF], 1);
        assert!(cpu.framebuffer.snapshot().pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_draw_reads_16bit_rows_in_extended_mode() {
        let mut cpu = cpu_with_program(&[0x00FF, 0xA300, 0xD010]);
        cpu.memory[0x300] = 0x80;
        cpu.memory[0x301] = 0x01;
        cpu.step().unwrap();
        assert!(cpu.framebuffer.hires());
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.framebuffer.get(0, 0), 1);
        assert_eq!(cpu.framebuffer.get(15, 0), 1);
    }

    #[test]
    fn test_bcd() {
        let mut cpu = cpu_with_program(&[0xA300, 0xF033]);
        cpu.v[0] = 234;
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.memory[0x300], 2);
        assert_eq!(cpu.memory[0x301], 3);
        assert_eq!(cpu.memory[0x302], 4);
    }

    #[test]
    fn test_register_block_store_load() {
        let mut cpu = cpu_with_program(&[0xA300, 0xF255, 0x6000, 0x6100, 0x6200, 0xF265]);
        cpu.v[0] = 0xAA;
        cpu.v[1] = 0xBB;
        cpu.v[2] = 0xCC;
        for _ in 0..6 {
            cpu.step().unwrap();
        }
        assert_eq!(&cpu.memory[0x300..0x303], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(&cpu.v[0..3], &[0xAA, 0xBB, 0xCC]);
        // I is untouched by the block transfer
        assert_eq!(cpu.i, 0x300);
    }

    #[test]
    fn test_rpl_flags_clamp_to_eight() {
        let mut cpu = cpu_with_program(&[0xF975, 0x6000, 0xF985]);
        cpu.v = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 0, 0, 0, 0, 0, 0];
        cpu.step().unwrap();
        assert_eq!(cpu.rpl, [1, 2, 3, 4, 5, 6, 7, 8]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 1);
        // V8 and V9 never made it into the bank
        assert_eq!(cpu.v[8], 9);
        assert_eq!(cpu.v[9], 10);
    }

    #[test]
    fn test_wait_key_blocks_until_key() {
        let mut cpu = cpu_with_program(&[0xF30A]);
        let r = cpu.step().unwrap();
        assert!(r.awaiting_key);
        assert_eq!(cpu.pc, 0x200);
        // still parked on the same instruction
        let r = cpu.step().unwrap();
        assert!(r.awaiting_key);

        cpu.set_key(7);
        let r = cpu.step().unwrap();
        assert!(!r.awaiting_key);
        assert_eq!(cpu.v[3], 7);
        assert_eq!(cpu.pc, 0x202);
        assert!(cpu.keys.iter().all(|&k| !k));
    }

    #[test]
    fn test_timers_tick_while_awaiting_key() {
        let mut cpu = cpu_with_program(&[0xF30A]);
        cpu.delay_timer = 3;
        cpu.step().unwrap();
        assert_eq!(cpu.delay_timer, 2);
    }

    #[test]
    fn test_key_skip_consumes_key() {
        let mut cpu = cpu_with_program(&[0xE09E]);
        cpu.v[0] = 5;
        cpu.set_key(5);
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x204);
        assert!(!cpu.keys[5]);
    }

    #[test]
    fn test_key_skip_not_pressed() {
        let mut cpu = cpu_with_program(&[0xE0A1]);
        cpu.v[0] = 5;
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x204);

        let mut cpu = cpu_with_program(&[0xE0A1]);
        cpu.v[0] = 5;
        cpu.set_key(5);
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x202);
    }

    #[test]
    fn test_single_key_model() {
        let mut cpu = Chip8Cpu::new();
        cpu.set_key(3);
        cpu.set_key(9);
        assert!(!cpu.keys[3]);
        assert!(cpu.keys[9]);
        // out of range is ignored entirely
        cpu.set_key(16);
        assert!(cpu.keys[9]);
    }

    #[test]
    fn test_timer_roundtrip_and_beep_edge() {
        let mut cpu = cpu_with_program(&[0x6002, 0xF018, 0xF107, 0xF107]);
        cpu.step().unwrap();
        // the set-sound cycle already ticks the timer: 2 -> 1, no beep
        let r = cpu.step().unwrap();
        assert!(!r.beeped);
        assert_eq!(cpu.sound_timer, 1);
        // 1 -> 0 raises the one-shot beep
        let r = cpu.step().unwrap();
        assert!(r.beeped);
        assert_eq!(cpu.sound_timer, 0);
        assert_eq!(cpu.v[1], 0);
        // stays silent once expired
        let r = cpu.step().unwrap();
        assert!(!r.beeped);
    }

    #[test]
    fn test_add_index_overflow_flag() {
        let mut cpu = cpu_with_program(&[0xF01E]);
        cpu.i = 0xFFE;
        cpu.v[0] = 5;
        cpu.step().unwrap();
        assert_eq!(cpu.i, 0x1003);
        assert_eq!(cpu.v[0xF], 1);

        let mut cpu = cpu_with_program(&[0xF01E]);
        cpu.i = 0x100;
        cpu.v[0] = 5;
        cpu.v[0xF] = 0;
        cpu.step().unwrap();
        assert_eq!(cpu.i, 0x105);
        assert_eq!(cpu.v[0xF], 0);
    }

    #[test]
    fn test_index_arithmetic_wraps_at_u16_limit() {
        // FX1E never masks I, so it can park it at the top of u16
        // range; I-relative access must then wrap instead of
        // overflowing
        let mut cpu = cpu_with_program(&[0xF01E, 0xF133]);
        cpu.i = 0xFFFE;
        cpu.v[0] = 1;
        cpu.v[1] = 234;
        cpu.step().unwrap();
        assert_eq!(cpu.i, 0xFFFF);
        cpu.step().unwrap();
        assert_eq!(cpu.memory[0xFFF], 2);
        assert_eq!(cpu.memory[0x000], 3);
        assert_eq!(cpu.memory[0x001], 4);
    }

    #[test]
    fn test_register_block_transfer_wraps_at_u16_limit() {
        let mut cpu = cpu_with_program(&[0xF155, 0x6000, 0x6100, 0xF165]);
        cpu.i = 0xFFFF;
        cpu.v[0] = 0xAA;
        cpu.v[1] = 0xBB;
        cpu.step().unwrap();
        assert_eq!(cpu.memory[0xFFF], 0xAA);
        assert_eq!(cpu.memory[0x000], 0xBB);
        cpu.step().unwrap();
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 0xAA);
        assert_eq!(cpu.v[1], 0xBB);
    }

    #[test]
    fn test_draw_row_reads_wrap_at_u16_limit() {
        let mut cpu = cpu_with_program(&[0xD012]);
        cpu.i = 0xFFFF;
        cpu.step().unwrap();
        // row 0 comes from 0xFFF (empty), row 1 wraps to the font
        // table at 0x000
        assert_eq!(cpu.framebuffer.get(0, 1), 1);
        assert_eq!(cpu.framebuffer.get(3, 1), 1);
    }

    #[test]
    fn test_font_addresses() {
        let mut cpu = cpu_with_program(&[0xF029, 0x6A07, 0xFA30]);
        cpu.v[0] = 0xA;
        cpu.step().unwrap();
        assert_eq!(cpu.i, 10 * 5);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.i, BIG_FONT_BASE + 7 * 10);
    }

    #[test]
    fn test_absolute_index_byte_form() {
        let mut cpu = cpu_with_program(&[0xF042]);
        cpu.step().unwrap();
        assert_eq!(cpu.i, 0x42);
    }

    #[test]
    fn test_exit_sets_persistent_flag() {
        let mut cpu = cpu_with_program(&[0x00FD, 0x6001]);
        let r = cpu.step().unwrap();
        assert!(r.exit_requested);
        // the machine itself keeps running; the host decides to stop
        let r = cpu.step().unwrap();
        assert!(r.exit_requested);
        assert_eq!(cpu.v[0], 1);
    }

    #[test]
    fn test_unknown_opcode_advances_pc() {
        let mut cpu = cpu_with_program(&[0x8AB8, 0x6001]);
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x202);
        cpu.step().unwrap();
        assert_eq!(cpu.v[0], 1);
    }

    #[test]
    fn test_scroll_down_instruction() {
        let mut cpu = cpu_with_program(&[0x00C2]);
        cpu.framebuffer.set(5, 0);
        let r = cpu.step().unwrap();
        assert!(r.drew);
        assert_eq!(cpu.framebuffer.get(5, 2), 1);
        assert_eq!(cpu.framebuffer.get(5, 0), 0);
    }

    #[test]
    fn test_draw_addressing_wraps_twelve_bits() {
        // I beyond the address space reads wrapped memory instead of
        // panicking
        let mut cpu = cpu_with_program(&[0xD011]);
        cpu.i = 0x1000; // wraps to 0x000, the font table
        cpu.step().unwrap();
        assert_eq!(cpu.v[0xF], 0);
    }
}
