//! Monochrome framebuffer with SuperChip extended mode.
//!
//! Storage is always the full 128x64 cell grid; the hires flag selects
//! which leading region (64x32 or 128x64) is active. Sprite drawing and
//! scrolling only ever touch the active region, and draw coordinates
//! wrap modulo the active region's flattened size, not per axis.

use emu_core::types::Frame;
use serde::{Deserialize, Serialize};

/// Physical framebuffer width in cells.
pub const MAX_WIDTH: usize = 128;
/// Physical framebuffer height in cells.
pub const MAX_HEIGHT: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Framebuffer {
    /// One byte per cell, 0 or 1, row-major over the active width.
    pixels: Vec<u8>,
    hires: bool,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; MAX_WIDTH * MAX_HEIGHT],
            hires: false,
        }
    }

    /// Active region width in cells.
    pub fn width(&self) -> usize {
        if self.hires {
            MAX_WIDTH
        } else {
            MAX_WIDTH / 2
        }
    }

    /// Active region height in cells.
    pub fn height(&self) -> usize {
        if self.hires {
            MAX_HEIGHT
        } else {
            MAX_HEIGHT / 2
        }
    }

    pub fn hires(&self) -> bool {
        self.hires
    }

    /// Switch extended mode. Existing cell contents are untouched; the
    /// host sees a resized active region on the next snapshot.
    pub fn set_hires(&mut self, hires: bool) {
        self.hires = hires;
    }

    /// Zero every cell, including the inactive region.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// XOR a sprite into the active region at (x, y).
    ///
    /// Each row is 8 pixels from the low byte, or 16 pixels from the
    /// full word when `wide` is set. Returns true if any set cell was
    /// toggled off (the collision condition).
    pub fn draw(&mut self, x: u8, y: u8, rows: &[u16], wide: bool) -> bool {
        let w = self.width();
        let size = w * self.height();
        let sprite_width = if wide { 16 } else { 8 };
        let msb = if wide { 0x8000 } else { 0x80 };

        let mut collision = false;
        for (row, &bits) in rows.iter().enumerate() {
            for col in 0..sprite_width {
                if bits & (msb >> col) != 0 {
                    let idx = (x as usize + col + (y as usize + row) * w) % size;
                    if self.pixels[idx] == 1 {
                        collision = true;
                    }
                    self.pixels[idx] ^= 1;
                }
            }
        }
        collision
    }

    /// Scroll the active region down by `n` rows, zero-filling the top.
    pub fn scroll_down(&mut self, n: u8) {
        let w = self.width();
        let size = w * self.height();
        let shift = w * n as usize;
        if shift == 0 {
            return;
        }
        if shift < size {
            self.pixels.copy_within(0..size - shift, shift);
        }
        self.pixels[..shift.min(size)].fill(0);
    }

    /// Scroll the active region right by 4 columns.
    pub fn scroll_right(&mut self) {
        let w = self.width();
        let size = w * self.height();
        for row in (0..size).step_by(w) {
            self.pixels.copy_within(row..row + w - 4, row + 4);
            self.pixels[row..row + 4].fill(0);
        }
    }

    /// Scroll the active region left by 4 columns.
    pub fn scroll_left(&mut self) {
        let w = self.width();
        let size = w * self.height();
        for row in (0..size).step_by(w) {
            self.pixels.copy_within(row + 4..row + w, row);
            self.pixels[row + w - 4..row + w].fill(0);
        }
    }

    /// Snapshot the active region.
    pub fn snapshot(&self) -> Frame {
        let w = self.width();
        let h = self.height();
        let mut frame = Frame::new(w as u32, h as u32);
        frame.pixels.copy_from_slice(&self.pixels[..w * h]);
        frame
    }

    #[cfg(test)]
    pub(crate) fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[x + y * self.width()]
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, x: usize, y: usize) {
        let w = self.width();
        self.pixels[x + y * w] = 1;
    }
}
