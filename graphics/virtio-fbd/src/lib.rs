// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Framebuffer driver for paravirtualized display adapters
//!
//! Drives VirtIO GPU, QXL and the other QEMU/hypervisor display models
//! through their VBE DISPI register interface, and brings up 3D
//! acceleration through the GAL when the device offers it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Host graphics stack / client                 │
//! └───────┬──────────────────────┬───────────────────────▲──────┘
//!         │ mode queries, ioctl  │ set_attribute         │ connection
//!         │                      │ (Captured)            │ changed
//! ┌───────▼──────────────────────▼───────────────────────┴──────┐
//! │                        Framebuffer                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ Mode registry│  │  ModeSwitch  │  │  ApertureManager   │  │
//! │  └──────┬───────┘  └──────┬───────┘  └─────────┬──────────┘  │
//! │         └───────── SharedDisplay (one lock) ───┘             │
//! │                           │                                  │
//! │  ┌────────────────────────▼──────┐  ┌─────────────────────┐  │
//! │  │ DisplayBus (VBE DISPI)        │  │ AccelerationBackend │  │
//! │  └───────────────────────────────┘  └──────────┬──────────┘  │
//! └────────────────────────────────────────────────┼─────────────┘
//!                                                  │ gal::Device
//!                                       ┌──────────▼──────────┐
//!                                       │  gal-virtio backend │
//!                                       └─────────────────────┘
//! ```

pub mod accel;
pub mod aperture;
pub mod bus;
pub mod capability;
pub mod classify;
pub mod config;
mod deferred;
pub mod display;
pub mod error;
pub mod framebuffer;
pub mod memory;
pub mod modes;
pub mod notify;
pub mod pci;
pub mod properties;
pub mod switch;
pub mod vbe;

pub use crate::aperture::Aperture;
pub use crate::classify::{classify, probe_score, DeviceFamily, DeviceProfile, Hints};
pub use crate::config::DriverConfig;
pub use crate::display::SwitchStep;
pub use crate::error::{Error, Result, Status};
pub use crate::framebuffer::{
    Attribute, ConnectionAttribute, CustomModeData, Framebuffer, LifecycleState,
};
pub use crate::modes::{DisplayModeEntry, ModeFlags, ModeId};
pub use crate::notify::{InterruptProc, InterruptRef, InterruptType};
pub use crate::pci::DeviceIdentity;
