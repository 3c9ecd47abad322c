//! VirtIO-GPU Backend for the Graphics Abstraction Layer
//!
//! This crate provides a VirtIO-GPU implementation of the GAL traits used
//! by the framebuffer driver to bring up 2D/3D acceleration in virtual
//! machines.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ Framebuffer driver  │
//! │    (virtio-fbd)     │
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │   GAL Interface     │
//! │(Device, Accelerator)│
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │   VirtIO-GPU GAL    │◄─── This crate
//! │     Backend         │
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │  VirtioTransport    │
//! │ (PCI or loopback)   │
//! └─────────────────────┘
//! ```
//!
//! # Capabilities
//!
//! - **2D Mode**: Basic framebuffer, cursor support
//! - **3D Mode (virgl)**: reported when the host offers a virgl capset
//! - **Mock**: a capability-limited device used when probe fails
//!
//! # Usage
//!
//! ```ignore
//! use gal_virtio::{LoopbackTransport, VirtioGpuDevice};
//!
//! let device = VirtioGpuDevice::probe(Arc::new(LoopbackTransport::with_virgl()))?;
//! println!("Device: {}", device.info().name);
//! println!("Capabilities: {:?}", device.info().capabilities);
//! ```

#![no_std]

extern crate alloc;

mod accel;
mod device;
pub mod protocol;
mod transport;

pub use accel::{alloc_context_id, VirtioAccelerator};
pub use device::VirtioGpuDevice;
pub use transport::{FailPoints, LoopbackTransport, VirtioTransport};
