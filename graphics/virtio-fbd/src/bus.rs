// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Display bus interface
//!
//! The register-level side of the adapter: mode-set writes, geometry and
//! VRAM queries. The driver treats it as a black box and only calls it with
//! the shared display lock held.

use crate::error::Result;
use crate::memory::MemoryRange;

pub trait DisplayBus: Send {
    /// Detect the adapter and read its limits
    fn init(&mut self) -> Result<()>;

    /// Map VRAM and enable the linear framebuffer
    fn start(&mut self) -> Result<()>;

    /// Program a new scanout geometry
    fn set_mode(&mut self, width: u32, height: u32, bpp: u32) -> Result<()>;

    fn max_width(&self) -> u32;

    fn max_height(&self) -> u32;

    fn current_width(&self) -> u32;

    fn current_height(&self) -> u32;

    /// VRAM size the device reports
    fn vram_size(&self) -> u64;

    /// Mapped VRAM, `None` before `start`
    fn vram(&self) -> Option<MemoryRange>;

    /// Offset of the visible framebuffer inside VRAM
    fn current_fb_offset(&self) -> u64;

    /// Size of the visible framebuffer
    fn current_fb_size(&self) -> u64;

    /// Release the adapter. Must not fail.
    fn cleanup(&mut self);
}

/// Row pitch for a 32-bit framebuffer: width rounded up to 8 pixels
pub const fn bytes_per_row(width: u32) -> u32 {
    ((width + 7) & !7) << 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_row_alignment() {
        assert_eq!(bytes_per_row(1024), 4096);
        assert_eq!(bytes_per_row(1366), 1368 * 4);
        assert_eq!(bytes_per_row(1), 32);
    }
}
