// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Bochs/QEMU VBE DISPI display bus
//!
//! Register programming for the DISPI interface every QEMU display model
//! exposes (std VGA, QXL, virtio-vga). `SimulatedDispi` provides an
//! in-memory register file with the same behaviour.

use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use gal::Extent2D;

use crate::bus::{bytes_per_row, DisplayBus};
use crate::classify::DeviceFamily;
use crate::error::{Error, Result};
use crate::memory::{MemoryRange, MemoryRegion};

/// DISPI register indices and values
pub mod dispi {
    pub const INDEX_ID: u16 = 0x0;
    pub const INDEX_XRES: u16 = 0x1;
    pub const INDEX_YRES: u16 = 0x2;
    pub const INDEX_BPP: u16 = 0x3;
    pub const INDEX_ENABLE: u16 = 0x4;
    pub const INDEX_BANK: u16 = 0x5;
    pub const INDEX_VIRT_WIDTH: u16 = 0x6;
    pub const INDEX_VIRT_HEIGHT: u16 = 0x7;
    pub const INDEX_X_OFFSET: u16 = 0x8;
    pub const INDEX_Y_OFFSET: u16 = 0x9;
    pub const NUM_REGISTERS: usize = 10;

    pub const ID0: u16 = 0xB0C0;
    pub const ID1: u16 = 0xB0C1;
    pub const ID2: u16 = 0xB0C2;
    pub const ID3: u16 = 0xB0C3;
    pub const ID4: u16 = 0xB0C4;
    pub const ID5: u16 = 0xB0C5;

    pub const DISABLED: u16 = 0x00;
    pub const ENABLED: u16 = 0x01;
    pub const GETCAPS: u16 = 0x02;
    pub const DAC_8BIT: u16 = 0x20;
    pub const LFB_ENABLED: u16 = 0x40;
    pub const NOCLEARMEM: u16 = 0x80;

    pub const MAX_XRES: u32 = 2560;
    pub const MAX_YRES: u32 = 1600;

    pub const LFB_PHYSICAL_ADDRESS: u64 = 0xE000_0000;
}

pub const MIB: u64 = 1024 * 1024;

/// A value for a 16-bit DISPI register
fn register_value(value: u32) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| Error::Bus(format!("{} does not fit a DISPI register", value)))
}

/// VRAM size to assume for a family when the device does not say
pub fn default_vram_size(family: DeviceFamily, bar0: Option<u64>) -> u64 {
    match family {
        DeviceFamily::Qxl | DeviceFamily::Unknown => bar0.filter(|&n| n > 0).unwrap_or(16 * MIB),
        DeviceFamily::VirtioGpuStandard
        | DeviceFamily::VirtioGpu3D
        | DeviceFamily::VirtioGpuExtended(_)
        | DeviceFamily::QemuVariant => 16 * MIB,
        DeviceFamily::HyperVSynthetic | DeviceFamily::HyperVDDA => 32 * MIB,
        DeviceFamily::VMwareSVGA => 24 * MIB,
        DeviceFamily::AMDVirtualized | DeviceFamily::NVIDIAVirtualized => 64 * MIB,
        DeviceFamily::IntelVirtualized => 32 * MIB,
    }
}

/// Index/data register access
pub trait DispiPort: Send {
    fn read(&mut self, index: u16) -> u16;
    fn write(&mut self, index: u16, value: u16);
}

/// A port shared with whoever wants to watch the registers
impl<P: DispiPort> DispiPort for Arc<Mutex<P>> {
    fn read(&mut self, index: u16) -> u16 {
        self.lock().read(index)
    }

    fn write(&mut self, index: u16, value: u16) {
        self.lock().write(index, value)
    }
}

/// In-memory DISPI register file
pub struct SimulatedDispi {
    regs: [u16; dispi::NUM_REGISTERS],
    id: u16,
    caps: (u16, u16, u16),
    log: Vec<(u16, u16)>,
}

impl SimulatedDispi {
    /// A DISPI ID5 adapter with the given maximum and initial geometry
    pub fn new(max: Extent2D, initial: Extent2D) -> Self {
        let mut regs = [0u16; dispi::NUM_REGISTERS];
        regs[dispi::INDEX_XRES as usize] = saturate(initial.width);
        regs[dispi::INDEX_YRES as usize] = saturate(initial.height);
        regs[dispi::INDEX_BPP as usize] = 32;
        regs[dispi::INDEX_ENABLE as usize] = dispi::ENABLED | dispi::LFB_ENABLED;
        Self {
            regs,
            id: dispi::ID5,
            caps: (saturate(max.width), saturate(max.height), 32),
            log: Vec::new(),
        }
    }

    /// Pretend no DISPI adapter is present
    pub fn absent() -> Self {
        let mut dev = Self::new(Extent2D::new(0, 0), Extent2D::new(0, 0));
        dev.id = 0xFFFF;
        dev
    }

    /// Every register write so far, in order
    pub fn writes(&self) -> &[(u16, u16)] {
        &self.log
    }
}

fn saturate(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

impl DispiPort for SimulatedDispi {
    fn read(&mut self, index: u16) -> u16 {
        let getcaps = self.regs[dispi::INDEX_ENABLE as usize] & dispi::GETCAPS != 0;
        match index {
            dispi::INDEX_ID => self.id,
            dispi::INDEX_XRES if getcaps => self.caps.0,
            dispi::INDEX_YRES if getcaps => self.caps.1,
            dispi::INDEX_BPP if getcaps => self.caps.2,
            i if (i as usize) < dispi::NUM_REGISTERS => self.regs[i as usize],
            _ => 0xFFFF,
        }
    }

    fn write(&mut self, index: u16, value: u16) {
        self.log.push((index, value));
        match index {
            // writing an id selects the interface revision; absent devices ignore it
            dispi::INDEX_ID => {
                if self.id != 0xFFFF && (dispi::ID0..=dispi::ID5).contains(&value) {
                    self.id = value;
                }
            }
            i if (i as usize) < dispi::NUM_REGISTERS => self.regs[i as usize] = value,
            _ => {}
        }
    }
}

/// [`DisplayBus`] over a DISPI port
pub struct VbeDisplayBus {
    port: Box<dyn DispiPort>,
    region: Arc<dyn MemoryRegion>,
    vram: Option<MemoryRange>,
    vram_size: u64,
    max: Extent2D,
    current: Extent2D,
    bpp: u32,
}

impl VbeDisplayBus {
    /// `vram_size` is what the device reports; `region` is the mapping
    pub fn new(port: Box<dyn DispiPort>, region: Arc<dyn MemoryRegion>, vram_size: u64) -> Self {
        Self {
            port,
            region,
            vram: None,
            vram_size,
            max: Extent2D::default(),
            current: Extent2D::default(),
            bpp: 0,
        }
    }

    fn probe_caps(&mut self) -> Extent2D {
        let enable = self.port.read(dispi::INDEX_ENABLE);
        self.port.write(dispi::INDEX_ENABLE, enable | dispi::GETCAPS);
        let w = self.port.read(dispi::INDEX_XRES) as u32;
        let h = self.port.read(dispi::INDEX_YRES) as u32;
        self.port.write(dispi::INDEX_ENABLE, enable);

        if w == 0 || h == 0 {
            return Extent2D::new(dispi::MAX_XRES, dispi::MAX_YRES);
        }
        Extent2D::new(w.min(dispi::MAX_XRES), h.min(dispi::MAX_YRES))
    }
}

impl DisplayBus for VbeDisplayBus {
    fn init(&mut self) -> Result<()> {
        self.port.write(dispi::INDEX_ID, dispi::ID5);
        let id = self.port.read(dispi::INDEX_ID);
        if !(dispi::ID0..=dispi::ID5).contains(&id) {
            return Err(Error::Bus(format!("no DISPI interface (id {:#06x})", id)));
        }

        self.max = self.probe_caps();
        self.current = Extent2D::new(
            self.port.read(dispi::INDEX_XRES) as u32,
            self.port.read(dispi::INDEX_YRES) as u32,
        );
        self.bpp = self.port.read(dispi::INDEX_BPP) as u32;

        info!(
            "vbe: DISPI {:#06x}, max {}, current {}x{}, {} MiB VRAM",
            id,
            self.max,
            self.current,
            self.bpp,
            self.vram_size / MIB
        );
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.region.len() == 0 {
            return Err(Error::Bus("VRAM region is empty".into()));
        }
        self.vram = Some(MemoryRange::new(Arc::clone(&self.region)));
        Ok(())
    }

    fn set_mode(&mut self, width: u32, height: u32, bpp: u32) -> Result<()> {
        if width == 0 || height == 0 || width > self.max.width || height > self.max.height {
            return Err(Error::Bus(format!("{}x{} exceeds {}", width, height, self.max)));
        }
        if !matches!(bpp, 8 | 15 | 16 | 24 | 32) {
            return Err(Error::Bus(format!("unsupported depth {}", bpp)));
        }
        let needed = ((width + 7) & !7) as u64 * height as u64 * bpp.div_ceil(8) as u64;
        if needed > self.vram_size {
            return Err(Error::Bus(format!(
                "{}x{}x{} needs {} bytes of VRAM",
                width, height, bpp, needed
            )));
        }

        let xres = register_value(width)?;
        let yres = register_value(height)?;
        let depth = register_value(bpp)?;
        self.port.write(dispi::INDEX_ENABLE, dispi::DISABLED);
        self.port.write(dispi::INDEX_XRES, xres);
        self.port.write(dispi::INDEX_YRES, yres);
        self.port.write(dispi::INDEX_BPP, depth);
        self.port.write(dispi::INDEX_ENABLE, dispi::ENABLED | dispi::LFB_ENABLED);

        self.current = Extent2D::new(width, height);
        self.bpp = bpp;
        debug!("vbe: mode set to {}x{}x{}", width, height, bpp);
        Ok(())
    }

    fn max_width(&self) -> u32 {
        self.max.width
    }

    fn max_height(&self) -> u32 {
        self.max.height
    }

    fn current_width(&self) -> u32 {
        self.current.width
    }

    fn current_height(&self) -> u32 {
        self.current.height
    }

    fn vram_size(&self) -> u64 {
        self.vram_size
    }

    fn vram(&self) -> Option<MemoryRange> {
        self.vram.clone()
    }

    fn current_fb_offset(&self) -> u64 {
        0
    }

    fn current_fb_size(&self) -> u64 {
        let size = bytes_per_row(self.current.width) as u64 * self.current.height as u64;
        size.min(self.vram_size)
    }

    fn cleanup(&mut self) {
        if self.vram.take().is_some() {
            self.port.write(dispi::INDEX_ENABLE, dispi::DISABLED);
            debug!("vbe: adapter released");
        }
    }
}
