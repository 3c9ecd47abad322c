//! Device abstraction for GPU hardware
//!
//! This module provides the core `Device` trait implemented by GPU backends
//! (VirtIO-GPU, mock devices). The surface is deliberately narrow: capability
//! queries, bring-up steps and the tuning knobs a display driver applies
//! after probe.

use alloc::string::String;
use bitflags::bitflags;

use crate::{Extent2D, Result};

/// Type of GPU device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// VirtIO GPU device (for VMs)
    VirtioGpu,
    /// VirtIO GPU with 3D acceleration (virgl/venus)
    VirtioGpu3D,
    /// Capability-limited stand-in used when real bring-up fails
    Mock,
    /// Unknown device type
    Unknown,
}

impl DeviceType {
    /// Check if this device type supports hardware acceleration
    pub fn supports_acceleration(&self) -> bool {
        matches!(self, DeviceType::VirtioGpu3D)
    }
}

bitflags! {
    /// Device capability flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceCapabilities: u64 {
        /// Supports 2D blitting operations
        const BLIT_2D = 1 << 0;
        /// Supports 3D rendering
        const RENDER_3D = 1 << 1;
        /// Supports the virgl OpenGL protocol
        const VIRGL = 1 << 2;
        /// Supports hardware cursor
        const HW_CURSOR = 1 << 4;
        /// Supports multiple displays
        const MULTI_DISPLAY = 1 << 5;
        /// Supports EDID reading
        const EDID = 1 << 6;
        /// Supports blob resources (host-visible memory)
        const BLOB_RESOURCES = 1 << 7;
        /// Supports context isolation
        const CONTEXTS = 1 << 8;
        /// Supports vertical sync
        const VSYNC = 1 << 9;
    }
}

/// Information about a GPU device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Vendor ID
    pub vendor_id: u32,
    /// Device ID
    pub device_id: u32,
    /// Device type
    pub device_type: DeviceType,
    /// Device capabilities
    pub capabilities: DeviceCapabilities,
    /// Number of scanouts the device exposes
    pub display_count: u32,
    /// Largest scanout the device accepts
    pub max_resolution: Extent2D,
    /// Total device memory (bytes)
    pub total_memory: u64,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            vendor_id: 0,
            device_id: 0,
            device_type: DeviceType::Unknown,
            capabilities: DeviceCapabilities::empty(),
            display_count: 1,
            max_resolution: Extent2D::new(4096, 4096),
            total_memory: 0,
        }
    }
}

/// Core device trait for GPU operations
///
/// Every query may fail independently; callers treat them as best-effort.
pub trait Device: Send + Sync {
    /// Get device information
    fn info(&self) -> &DeviceInfo;

    /// True for the capability-limited fallback device
    fn is_mock(&self) -> bool;

    /// Set up the control and cursor queues
    fn initialize_queues(&self) -> Result<()>;

    /// Map the memory regions the device shares with the host
    fn setup_memory_regions(&self) -> Result<()>;

    /// Turn on 3D command processing
    fn enable_3d(&self) -> Result<()>;

    /// Maximum number of displays
    fn max_displays(&self) -> Result<u32>;

    /// Maximum scanout resolution
    fn max_resolution(&self) -> Result<Extent2D>;

    fn supports_3d(&self) -> Result<bool>;

    fn supports_virgl(&self) -> Result<bool>;

    fn supports_resource_blob(&self) -> Result<bool>;

    /// Resize queues to the sizes the device prefers
    fn set_optimal_queue_sizes(&self) -> Result<()>;

    fn enable_resource_blob(&self) -> Result<()>;

    fn enable_virgl(&self) -> Result<()>;

    /// Preferred refresh rate in Hz
    fn set_preferred_refresh_rate(&self, hz: u32) -> Result<()>;

    fn enable_vsync(&self, enabled: bool) -> Result<()>;

    /// Start processing commands
    fn start(&self) -> Result<()>;

    /// Stop the device; must not fail
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_acceleration() {
        assert!(DeviceType::VirtioGpu3D.supports_acceleration());
        assert!(!DeviceType::VirtioGpu.supports_acceleration());
        assert!(!DeviceType::Mock.supports_acceleration());
    }

    #[test]
    fn test_default_info_is_2d_only() {
        let info = DeviceInfo::default();
        assert!(info.capabilities.is_empty());
        assert_eq!(info.display_count, 1);
        assert_eq!(info.device_type, DeviceType::Unknown);
    }
}
