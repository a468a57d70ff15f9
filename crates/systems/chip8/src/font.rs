//! Built-in font glyph tables.
//!
//! Both tables live in the interpreter-reserved area below 0x200:
//! the 4x5 CHIP-8 digits at 0x000 and the 8x10 SuperChip digits
//! directly after them at 0x050. FX29 and FX30 compute glyph
//! addresses from these bases.

/// Load address of the 5-byte-per-glyph table.
pub const FONT_BASE: u16 = 0x000;

/// Load address of the 10-byte-per-glyph SuperChip table.
pub const BIG_FONT_BASE: u16 = 0x050;

/// Bytes per glyph in the standard table.
pub const FONT_GLYPH_SIZE: u16 = 5;

/// Bytes per glyph in the SuperChip table.
pub const BIG_FONT_GLYPH_SIZE: u16 = 10;

/// 4x5 glyphs for digits 0-F, one row per byte (high nibble).
pub const FONT_SPRITES: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// 8x10 SuperChip glyphs for digits 0-F.
pub const BIG_FONT_SPRITES: [u8; 160] = [
    0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, // 0
    0x00, 0x08, 0x38, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, // 1
    0x00, 0x38, 0x44, 0x04, 0x08, 0x10, 0x20, 0x44, 0x7C, 0x00, // 2
    0x00, 0x38, 0x44, 0x04, 0x18, 0x04, 0x04, 0x44, 0x38, 0x00, // 3
    0x00, 0x0C, 0x14, 0x24, 0x24, 0x7E, 0x04, 0x04, 0x0E, 0x00, // 4
    0x00, 0x3E, 0x20, 0x20, 0x3C, 0x02, 0x02, 0x42, 0x3C, 0x00, // 5
    0x00, 0x0E, 0x10, 0x20, 0x3C, 0x22, 0x22, 0x22, 0x1C, 0x00, // 6
    0x00, 0x7E, 0x42, 0x02, 0x04, 0x04, 0x08, 0x08, 0x08, 0x00, // 7
    0x00, 0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x42, 0x3C, 0x00, // 8
    0x00, 0x3C, 0x42, 0x42, 0x42, 0x3E, 0x02, 0x04, 0x78, 0x00, // 9
    0x00, 0x18, 0x08, 0x14, 0x14, 0x14, 0x1C, 0x22, 0x77, 0x00, // A
    0x00, 0x7C, 0x22, 0x22, 0x3C, 0x22, 0x22, 0x22, 0x7C, 0x00, // B
    0x00, 0x1E, 0x22, 0x40, 0x40, 0x40, 0x40, 0x22, 0x1C, 0x00, // C
    0x00, 0x78, 0x24, 0x22, 0x22, 0x22, 0x22, 0x24, 0x78, 0x00, // D
    0x00, 0x7E, 0x22, 0x28, 0x38, 0x28, 0x20, 0x22, 0x7E, 0x00, // E
    0x00, 0x7E, 0x22, 0x28, 0x38, 0x28, 0x20, 0x20, 0x70, 0x00, // F
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_fit_below_program_area() {
        let end = BIG_FONT_BASE as usize + BIG_FONT_SPRITES.len();
        assert!(end <= 0x200);
    }

    #[test]
    fn test_tables_are_adjacent() {
        assert_eq!(
            FONT_BASE as usize + FONT_SPRITES.len(),
            BIG_FONT_BASE as usize
        );
    }
}
