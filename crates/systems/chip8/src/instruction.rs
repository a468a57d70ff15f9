//! Opcode decoding.
//!
//! A 16-bit instruction word is classified once into an [`Instruction`]
//! by walking its nibbles: the high nibble picks one of 16 routes, and
//! the 0x0, 0x8, 0xE and 0xF routes discriminate further on the low
//! byte or low nibble. Anything that falls through is `Unknown` and is
//! treated as a two-byte no-op by the executor.

use std::fmt;

/// A decoded CHIP-8 / SuperChip-8 instruction.
///
/// `x` and `y` name V registers, `n` is a low nibble, `nn` a low byte
/// and `nnn` a 12-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0: clear the screen
    ClearScreen,
    /// 00EE: return from subroutine
    Return,
    /// 00CN: scroll display N rows down (SuperChip)
    ScrollDown(u8),
    /// 00FB: scroll display 4 pixels right (SuperChip)
    ScrollRight,
    /// 00FC: scroll display 4 pixels left (SuperChip)
    ScrollLeft,
    /// 00FD: exit the interpreter (SuperChip)
    Exit,
    /// 00FE: disable extended screen mode (SuperChip)
    LoRes,
    /// 00FF: enable extended screen mode (SuperChip)
    HiRes,
    /// 1NNN: jump to address
    Jump(u16),
    /// 2NNN: call subroutine
    Call(u16),
    /// 3XNN: skip next instruction if VX == NN
    SkipEqImm { x: u8, nn: u8 },
    /// 4XNN: skip next instruction if VX != NN
    SkipNeImm { x: u8, nn: u8 },
    /// 5XY0: skip next instruction if VX == VY
    SkipEqReg { x: u8, y: u8 },
    /// 6XNN: VX = NN
    LoadImm { x: u8, nn: u8 },
    /// 7XNN: VX += NN (no carry flag)
    AddImm { x: u8, nn: u8 },
    /// 8XY0: VX = VY
    Move { x: u8, y: u8 },
    /// 8XY1: VX |= VY
    Or { x: u8, y: u8 },
    /// 8XY2: VX &= VY
    And { x: u8, y: u8 },
    /// 8XY3: VX ^= VY
    Xor { x: u8, y: u8 },
    /// 8XY4: VX += VY, VF = carry
    Add { x: u8, y: u8 },
    /// 8XY5: VX -= VY, VF = no-borrow
    Sub { x: u8, y: u8 },
    /// 8XY6: VF = VX & 1, VX >>= 1
    ShiftRight { x: u8 },
    /// 8XY7: VX = VY - VX, VF = no-borrow
    SubReversed { x: u8, y: u8 },
    /// 8XYE: VF = top bit of VX, VX <<= 1
    ShiftLeft { x: u8 },
    /// 9XY0: skip next instruction if VX != VY
    SkipNeReg { x: u8, y: u8 },
    /// ANNN: I = NNN
    LoadIndex(u16),
    /// BNNN: jump to NNN + V0
    JumpOffset(u16),
    /// CXNN: VX = random byte & NN
    Random { x: u8, nn: u8 },
    /// DXYN: draw N-row sprite from I at (VX, VY), VF = collision
    Draw { x: u8, y: u8, n: u8 },
    /// EX9E: skip next instruction if key VX is pressed
    SkipKeyPressed(u8),
    /// EXA1: skip next instruction if key VX is not pressed
    SkipKeyNotPressed(u8),
    /// FX07: VX = delay timer
    LoadDelay(u8),
    /// FX0A: wait for a key press, then VX = key
    WaitKey(u8),
    /// FX15: delay timer = VX
    SetDelay(u8),
    /// FX18: sound timer = VX
    SetSound(u8),
    /// FX1E: I += VX, VF = 1 on 12-bit overflow
    AddIndex(u8),
    /// FX29: I = address of 5-byte glyph for digit VX
    LoadFont(u8),
    /// FX30: I = address of 10-byte glyph for digit VX (SuperChip)
    LoadBigFont(u8),
    /// FX33: store BCD of VX at I, I+1, I+2
    StoreBcd(u8),
    /// FX55: store V0..=VX at I
    StoreRegisters(u8),
    /// FX65: load V0..=VX from I
    LoadRegisters(u8),
    /// FX75: store V0..=min(X,7) into the RPL flag bank (SuperChip)
    StoreFlags(u8),
    /// FX85: load V0..=min(X,7) from the RPL flag bank (SuperChip)
    LoadFlags(u8),
    /// F0NN: I = NN, an absolute form outside the 12-bit encoding
    LoadIndexByte(u8),
    /// Unrecognized bit pattern; executed as a two-byte no-op
    Unknown(u16),
}

impl Instruction {
    /// Classify a raw instruction word.
    pub fn decode(word: u16) -> Self {
        use Instruction::*;

        let x = ((word >> 8) & 0x0F) as u8;
        let y = ((word >> 4) & 0x0F) as u8;
        let n = (word & 0x000F) as u8;
        let nn = (word & 0x00FF) as u8;
        let nnn = word & 0x0FFF;

        match word >> 12 {
            0x0 => match (y, n) {
                (0xC, n) => ScrollDown(n),
                (0xE, 0x0) => ClearScreen,
                (0xE, 0xE) => Return,
                (0xF, 0xB) => ScrollRight,
                (0xF, 0xC) => ScrollLeft,
                (0xF, 0xD) => Exit,
                (0xF, 0xE) => LoRes,
                (0xF, 0xF) => HiRes,
                _ => Unknown(word),
            },
            0x1 => Jump(nnn),
            0x2 => Call(nnn),
            0x3 => SkipEqImm { x, nn },
            0x4 => SkipNeImm { x, nn },
            0x5 => SkipEqReg { x, y },
            0x6 => LoadImm { x, nn },
            0x7 => AddImm { x, nn },
            0x8 => match n {
                0x0 => Move { x, y },
                0x1 => Or { x, y },
                0x2 => And { x, y },
                0x3 => Xor { x, y },
                0x4 => Add { x, y },
                0x5 => Sub { x, y },
                0x6 => ShiftRight { x },
                0x7 => SubReversed { x, y },
                0xE => ShiftLeft { x },
                _ => Unknown(word),
            },
            0x9 => SkipNeReg { x, y },
            0xA => LoadIndex(nnn),
            0xB => JumpOffset(nnn),
            0xC => Random { x, nn },
            0xD => Draw { x, y, n },
            0xE => match nn {
                0x9E => SkipKeyPressed(x),
                0xA1 => SkipKeyNotPressed(x),
                _ => Unknown(word),
            },
            0xF => match nn {
                0x07 => LoadDelay(x),
                0x0A => WaitKey(x),
                0x15 => SetDelay(x),
                0x18 => SetSound(x),
                0x1E => AddIndex(x),
                0x29 => LoadFont(x),
                0x30 => LoadBigFont(x),
                0x33 => StoreBcd(x),
                0x55 => StoreRegisters(x),
                0x65 => LoadRegisters(x),
                0x75 => StoreFlags(x),
                0x85 => LoadFlags(x),
                // F0NN with an otherwise-unassigned low byte is the
                // absolute index form
                nn if word >> 8 == 0x00F0 => LoadIndexByte(nn),
                _ => Unknown(word),
            },
            _ => unreachable!("high nibble is 4 bits"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            ClearScreen => write!(f, "CLS"),
            Return => write!(f, "RET"),
            ScrollDown(n) => write!(f, "SCD {n}"),
            ScrollRight => write!(f, "SCR"),
            ScrollLeft => write!(f, "SCL"),
            Exit => write!(f, "EXIT"),
            LoRes => write!(f, "LOW"),
            HiRes => write!(f, "HIGH"),
            Jump(nnn) => write!(f, "JP {nnn:03X}"),
            Call(nnn) => write!(f, "CALL {nnn:03X}"),
            SkipEqImm { x, nn } => write!(f, "SE V{x:X}, {nn:02X}"),
            SkipNeImm { x, nn } => write!(f, "SNE V{x:X}, {nn:02X}"),
            SkipEqReg { x, y } => write!(f, "SE V{x:X}, V{y:X}"),
            LoadImm { x, nn } => write!(f, "LD V{x:X}, {nn:02X}"),
            AddImm { x, nn } => write!(f, "ADD V{x:X}, {nn:02X}"),
            Move { x, y } => write!(f, "LD V{x:X}, V{y:X}"),
            Or { x, y } => write!(f, "OR V{x:X}, V{y:X}"),
            And { x, y } => write!(f, "AND V{x:X}, V{y:X}"),
            Xor { x, y } => write!(f, "XOR V{x:X}, V{y:X}"),
            Add { x, y } => write!(f, "ADD V{x:X}, V{y:X}"),
            Sub { x, y } => write!(f, "SUB V{x:X}, V{y:X}"),
            ShiftRight { x } => write!(f, "SHR V{x:X}"),
            SubReversed { x, y } => write!(f, "SUBN V{x:X}, V{y:X}"),
            ShiftLeft { x } => write!(f, "SHL V{x:X}"),
            SkipNeReg { x, y } => write!(f, "SNE V{x:X}, V{y:X}"),
            LoadIndex(nnn) => write!(f, "LD I, {nnn:03X}"),
            JumpOffset(nnn) => write!(f, "JP V0, {nnn:03X}"),
            Random { x, nn } => write!(f, "RND V{x:X}, {nn:02X}"),
            Draw { x, y, n } => write!(f, "DRW V{x:X}, V{y:X}, {n:X}"),
            SkipKeyPressed(x) => write!(f, "SKP V{x:X}"),
            SkipKeyNotPressed(x) => write!(f, "SKNP V{x:X}"),
            LoadDelay(x) => write!(f, "LD V{x:X}, DT"),
            WaitKey(x) => write!(f, "LD V{x:X}, K"),
            SetDelay(x) => write!(f, "LD DT, V{x:X}"),
            SetSound(x) => write!(f, "LD ST, V{x:X}"),
            AddIndex(x) => write!(f, "ADD I, V{x:X}"),
            LoadFont(x) => write!(f, "LD F, V{x:X}"),
            LoadBigFont(x) => write!(f, "LD HF, V{x:X}"),
            StoreBcd(x) => write!(f, "LD B, V{x:X}"),
            StoreRegisters(x) => write!(f, "LD [I], V{x:X}"),
            LoadRegisters(x) => write!(f, "LD V{x:X}, [I]"),
            StoreFlags(x) => write!(f, "LD R, V{x:X}"),
            LoadFlags(x) => write!(f, "LD V{x:X}, R"),
            LoadIndexByte(nn) => write!(f, "LD I, {nn:02X}"),
            Unknown(word) => write!(f, "DW {word:04X}"),
        }
    }
}
