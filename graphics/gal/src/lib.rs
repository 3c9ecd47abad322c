//! Graphics Abstraction Layer (GAL)
//!
//! This crate provides the hardware-agnostic interfaces a display driver
//! uses to talk to a GPU device and to the 3D accelerator stacked on top of
//! it, without depending on any particular backend.
//!
//! # Architecture
//!
//! The GAL sits between a framebuffer driver and a GPU backend
//! (VirtIO-GPU, mock devices). It provides:
//!
//! - Device capability queries (displays, resolution, 3D, Virgl, blobs)
//! - Device bring-up and tuning steps
//! - The accelerator lifecycle (init, attach, start, stop, detach)
//!
//! # Usage
//!
//! ```ignore
//! use gal::{Accelerator, Device};
//!
//! let device: Arc<dyn Device> = Arc::new(VirtioGpuDevice::probe(transport)?);
//! device.initialize_queues()?;
//! device.setup_memory_regions()?;
//!
//! let mut accel = VirtioAccelerator::new();
//! accel.init()?;
//! accel.attach(device.clone())?;
//! accel.start()?;
//! ```

#![no_std]

extern crate alloc;

pub mod accel;
pub mod device;

// Re-exports
pub use accel::{AccelState, Accelerator};
pub use device::{Device, DeviceCapabilities, DeviceInfo, DeviceType};

use alloc::string::String;

/// Result type for GAL operations
pub type Result<T> = core::result::Result<T, Error>;

/// GAL error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Device not found or initialization failed
    DeviceNotFound,
    /// Out of memory
    OutOfMemory,
    /// Invalid parameter
    InvalidParameter,
    /// Feature not supported
    NotSupported,
    /// Operation failed
    OperationFailed,
    /// Object used before it was initialized or attached
    NotInitialized,
    /// Resource in use
    ResourceInUse,
    /// Timeout
    Timeout,
    /// Device lost
    DeviceLost,
    /// Transport (bus or queue) error
    TransportError(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::DeviceNotFound => write!(f, "Device not found"),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::InvalidParameter => write!(f, "Invalid parameter"),
            Error::NotSupported => write!(f, "Not supported"),
            Error::OperationFailed => write!(f, "Operation failed"),
            Error::NotInitialized => write!(f, "Not initialized"),
            Error::ResourceInUse => write!(f, "Resource in use"),
            Error::Timeout => write!(f, "Timeout"),
            Error::DeviceLost => write!(f, "Device lost"),
            Error::TransportError(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl core::error::Error for Error {}

/// Physical extent (2D)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(C)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by this extent
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clamp each dimension into `[min, max]`, never exceeding `max`
    pub fn clamp(self, min: Extent2D, max: Extent2D) -> Self {
        Self {
            width: self.width.max(min.width).min(max.width),
            height: self.height.max(min.height).min(max.height),
        }
    }
}

impl core::fmt::Display for Extent2D {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_raises_to_minimum() {
        let e = Extent2D::new(50, 50).clamp(Extent2D::new(800, 600), Extent2D::new(1920, 1080));
        assert_eq!(e, Extent2D::new(800, 600));
    }

    #[test]
    fn test_clamp_never_exceeds_maximum() {
        let e = Extent2D::new(10000, 10000)
            .clamp(Extent2D::new(800, 600), Extent2D::new(1920, 1080));
        assert_eq!(e, Extent2D::new(1920, 1080));
    }

    #[test]
    fn test_clamp_max_wins_over_min() {
        // a device smaller than the minimum still caps the result
        let e = Extent2D::new(1024, 768).clamp(Extent2D::new(800, 600), Extent2D::new(640, 480));
        assert_eq!(e, Extent2D::new(640, 480));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            alloc::format!("{}", Error::TransportError(String::from("queue 0"))),
            "Transport error: queue 0"
        );
        assert_eq!(alloc::format!("{}", Extent2D::new(1024, 768)), "1024x768");
    }
}
