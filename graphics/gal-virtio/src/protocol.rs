//! VirtIO-GPU protocol definitions
//!
//! This module defines the subset of VirtIO-GPU structures and constants
//! the backend needs for probe, capability discovery and context setup.

use bitflags::bitflags;

/// VirtIO GPU command types
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandType {
    GetCapsetInfo = 0x0108,

    // 3D commands
    CtxCreate = 0x0200,
    CtxDestroy,

    // Success responses
    RespOkNodata = 0x1100,
    RespOkCapsetInfo = 0x1102,

    // Error responses start here
    RespErrUnspec = 0x1200,
}

/// Control header for all VirtIO GPU commands
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ControlHeader {
    pub cmd_type: u32,
    pub flags: u32,
    pub fence_id: u64,
    pub ctx_id: u32,
    pub ring_idx: u8,
    pub padding: [u8; 3],
}

impl ControlHeader {
    pub fn new(cmd_type: CommandType) -> Self {
        Self {
            cmd_type: cmd_type as u32,
            flags: 0,
            fence_id: 0,
            ctx_id: 0,
            ring_idx: 0,
            padding: [0; 3],
        }
    }

    pub fn with_context(mut self, ctx_id: u32) -> Self {
        self.ctx_id = ctx_id;
        self
    }

    pub fn is_ok(&self) -> bool {
        (CommandType::RespOkNodata as u32..CommandType::RespErrUnspec as u32)
            .contains(&self.cmd_type)
    }
}

/// Feature bits (`VIRTIO_GPU_F_*`)
pub mod features {
    pub const VIRGL: u64 = 1 << 0;
    pub const EDID: u64 = 1 << 1;
    pub const RESOURCE_BLOB: u64 = 1 << 3;

    /// Everything this backend knows how to drive
    pub const SUPPORTED: u64 = VIRGL | EDID | RESOURCE_BLOB;
}

bitflags! {
    /// VirtIO device status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceStatus: u8 {
        const ACKNOWLEDGE = 1;
        const DRIVER = 2;
        const DRIVER_OK = 4;
        const FEATURES_OK = 8;
        const FAILED = 128;
    }
}

/// Device configuration space (`struct virtio_gpu_config`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct GpuConfig {
    pub events_read: u32,
    pub events_clear: u32,
    pub num_scanouts: u32,
    pub num_capsets: u32,
}

/// Get capset info request
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct GetCapsetInfo {
    pub header: ControlHeader,
    pub capset_index: u32,
    pub padding: u32,
}

impl GetCapsetInfo {
    pub fn new(capset_index: u32) -> Self {
        Self {
            header: ControlHeader::new(CommandType::GetCapsetInfo),
            capset_index,
            padding: 0,
        }
    }
}

/// Capset info response
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RespCapsetInfo {
    pub header: ControlHeader,
    pub capset_id: u32,
    pub capset_max_version: u32,
    pub capset_max_size: u32,
    pub padding: u32,
}

impl RespCapsetInfo {
    pub fn ok(capset: CapsetType, max_version: u32, max_size: u32) -> Self {
        Self {
            header: ControlHeader::new(CommandType::RespOkCapsetInfo),
            capset_id: capset as u32,
            capset_max_version: max_version,
            capset_max_size: max_size,
            padding: 0,
        }
    }
}

/// Capset types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CapsetType {
    /// virgl (OpenGL)
    Virgl = 1,
    /// virgl2 (improved virgl)
    Virgl2 = 2,
    /// Venus (Vulkan)
    Venus = 3,
}

impl CapsetType {
    pub fn from_raw(id: u32) -> Option<Self> {
        match id {
            1 => Some(CapsetType::Virgl),
            2 => Some(CapsetType::Virgl2),
            3 => Some(CapsetType::Venus),
            _ => None,
        }
    }

    pub fn is_virgl(self) -> bool {
        matches!(self, CapsetType::Virgl | CapsetType::Virgl2)
    }
}

/// 3D context create request
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CtxCreate {
    pub header: ControlHeader,
    pub nlen: u32,
    pub context_init: u32,
    pub debug_name: [u8; 64],
}

impl CtxCreate {
    pub fn new(ctx_id: u32, context_init: u32, name: &[u8]) -> Self {
        let mut debug_name = [0u8; 64];
        let len = name.len().min(64);
        debug_name[..len].copy_from_slice(&name[..len]);

        Self {
            header: ControlHeader::new(CommandType::CtxCreate).with_context(ctx_id),
            nlen: len as u32,
            context_init,
            debug_name,
        }
    }
}

/// 3D context destroy request
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CtxDestroy {
    pub header: ControlHeader,
}

impl CtxDestroy {
    pub fn new(ctx_id: u32) -> Self {
        Self {
            header: ControlHeader::new(CommandType::CtxDestroy).with_context(ctx_id),
        }
    }
}

/// Control queue index
pub const CONTROL_QUEUE: u16 = 0;
/// Cursor queue index
pub const CURSOR_QUEUE: u16 = 1;

/// Queue size used before the device is asked for its preference
pub const DEFAULT_QUEUE_SIZE: u16 = 64;
/// Upper bound applied when sizing queues to the device maximum
pub const OPTIMAL_QUEUE_SIZE: u16 = 256;

/// Maximum scanouts supported
pub const MAX_SCANOUTS: usize = 16;

/// Largest scanout a VirtIO GPU accepts
pub const MAX_RESOLUTION: u32 = 4096;
