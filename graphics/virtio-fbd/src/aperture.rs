// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! VRAM and aperture exposure

use std::sync::Arc;

use log::{debug, warn};

use crate::display::SharedDisplay;
use crate::error::Result;
use crate::memory::MemoryRange;

/// Named view onto VRAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aperture {
    /// The active framebuffer
    System,
    Other(u32),
}

pub struct ApertureManager {
    display: Arc<SharedDisplay>,
    vram: Option<MemoryRange>,
}

impl ApertureManager {
    /// `vram` is the mapping the bus returned after start
    pub fn new(display: Arc<SharedDisplay>, vram: Option<MemoryRange>) -> Self {
        Self { display, vram }
    }

    /// Usable VRAM, trimmed to what the device reports
    pub fn vram_range(&self) -> Option<MemoryRange> {
        let vram = self.vram.as_ref()?;
        let device_size = self.display.lock().bus.vram_size();
        if device_size >= vram.len() {
            return Some(vram.clone());
        }
        vram.sub_range(0, device_size)
    }

    /// Window of VRAM holding the visible framebuffer
    pub fn aperture_range(&self, aperture: Aperture) -> Option<MemoryRange> {
        if aperture != Aperture::System {
            return None;
        }
        let vram = self.vram.as_ref()?;
        let (offset, size) = {
            let state = self.display.lock();
            (state.bus.current_fb_offset(), state.bus.current_fb_size())
        };
        let range = vram.sub_range(offset, size);
        if range.is_none() {
            warn!(
                "virtio-fbd: framebuffer {:#x}+{:#x} outside VRAM ({:#x})",
                offset,
                size,
                vram.len()
            );
        }
        range
    }

    /// Zero the visible `width * height * 4` bytes if they fit in usable VRAM
    pub fn clear_visible(&self) -> Result<bool> {
        let Some(vram) = self.vram_range() else {
            return Ok(false);
        };
        let state = self.display.lock();
        let bytes = state.bus.current_width() as u64 * state.bus.current_height() as u64 * 4;
        if bytes > vram.len() {
            return Ok(false);
        }
        vram.fill(0, bytes, 0)?;
        debug!("virtio-fbd: cleared {} bytes of framebuffer", bytes);
        Ok(true)
    }
}
