//! VirtIO-GPU Device implementation
//!
//! This module implements the GAL Device trait for VirtIO-GPU, plus the
//! mock flavour a display driver falls back to when the real device cannot
//! be brought up.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, info, warn};
use spin::Mutex;

use gal::{Device, DeviceCapabilities, DeviceInfo, DeviceType, Error, Extent2D, Result};

use crate::protocol::{
    features, CapsetType, DeviceStatus, GetCapsetInfo, GpuConfig, CONTROL_QUEUE, CURSOR_QUEUE,
    DEFAULT_QUEUE_SIZE, MAX_RESOLUTION, OPTIMAL_QUEUE_SIZE,
};
use crate::transport::VirtioTransport;

/// Mutable device state
#[derive(Debug, Default)]
struct DeviceState {
    queues_ready: bool,
    shared_memory: u64,
    three_d_enabled: bool,
    blob_enabled: bool,
    virgl_enabled: bool,
    refresh_hz: u32,
    vsync: bool,
    running: bool,
}

/// Capset information
#[derive(Debug, Clone)]
struct CapsetInfo {
    id: CapsetType,
    max_version: u32,
}

/// VirtIO-GPU device implementation
pub struct VirtioGpuDevice {
    /// Device info
    info: DeviceInfo,
    /// Host transport; `None` for the mock device
    transport: Option<Arc<dyn VirtioTransport>>,
    /// Negotiated feature bits
    features: u64,
    /// Config space snapshot taken at probe
    config: GpuConfig,
    /// Available capsets
    capsets: Vec<CapsetInfo>,
    state: Mutex<DeviceState>,
}

impl VirtioGpuDevice {
    /// Probe a VirtIO GPU through `transport`
    ///
    /// Negotiates features, reads the config space and enumerates capsets.
    /// Queues are not touched until `initialize_queues`.
    pub fn probe(transport: Arc<dyn VirtioTransport>) -> Result<Self> {
        transport.set_status(DeviceStatus::ACKNOWLEDGE | DeviceStatus::DRIVER);

        let offered = match transport.device_features() {
            Ok(f) => f,
            Err(err) => {
                transport.set_status(DeviceStatus::FAILED);
                return Err(err);
            }
        };
        let negotiated = offered & features::SUPPORTED;
        if let Err(err) = transport.ack_features(negotiated) {
            transport.set_status(DeviceStatus::FAILED);
            return Err(err);
        }
        transport.set_status(
            DeviceStatus::ACKNOWLEDGE | DeviceStatus::DRIVER | DeviceStatus::FEATURES_OK,
        );

        let config = transport.read_config()?;
        let capsets = Self::probe_capsets(transport.as_ref(), &config)?;

        let mut capabilities = DeviceCapabilities::BLIT_2D | DeviceCapabilities::HW_CURSOR;

        let has_virgl = capsets.iter().any(|c| c.id.is_virgl());
        if !capsets.is_empty() {
            capabilities |= DeviceCapabilities::RENDER_3D | DeviceCapabilities::CONTEXTS;
        }
        if has_virgl && negotiated & features::VIRGL != 0 {
            capabilities |= DeviceCapabilities::VIRGL;
        }
        if negotiated & features::RESOURCE_BLOB != 0 {
            capabilities |= DeviceCapabilities::BLOB_RESOURCES;
        }
        if negotiated & features::EDID != 0 {
            capabilities |= DeviceCapabilities::EDID;
        }
        if config.num_scanouts > 1 {
            capabilities |= DeviceCapabilities::MULTI_DISPLAY;
        }

        let info = DeviceInfo {
            name: String::from("VirtIO GPU"),
            vendor_id: 0x1AF4, // Red Hat
            device_id: 0x1050, // VirtIO GPU
            device_type: if capabilities.contains(DeviceCapabilities::RENDER_3D) {
                DeviceType::VirtioGpu3D
            } else {
                DeviceType::VirtioGpu
            },
            capabilities,
            display_count: config.num_scanouts.max(1),
            max_resolution: Extent2D::new(MAX_RESOLUTION, MAX_RESOLUTION),
            total_memory: 0,
        };

        info!(
            "virtio-gpu: probed {} scanout(s), {} capset(s), features {:#x}",
            config.num_scanouts, config.num_capsets, negotiated
        );

        Ok(Self {
            info,
            transport: Some(transport),
            features: negotiated,
            config,
            capsets,
            state: Mutex::new(DeviceState::default()),
        })
    }

    /// Capability-limited stand-in with basic 3D support and one display
    pub fn mock() -> Self {
        let info = DeviceInfo {
            name: String::from("VirtIO GPU (mock)"),
            vendor_id: 0x1AF4,
            device_id: 0x1050,
            device_type: DeviceType::Mock,
            capabilities: DeviceCapabilities::BLIT_2D | DeviceCapabilities::RENDER_3D,
            display_count: 1,
            max_resolution: Extent2D::new(MAX_RESOLUTION, MAX_RESOLUTION),
            total_memory: 0,
        };
        debug!("virtio-gpu: created mock device");
        Self {
            info,
            transport: None,
            features: 0,
            config: GpuConfig {
                num_scanouts: 1,
                ..GpuConfig::default()
            },
            capsets: Vec::new(),
            state: Mutex::new(DeviceState::default()),
        }
    }

    /// Probe available capsets
    fn probe_capsets(
        transport: &dyn VirtioTransport,
        config: &GpuConfig,
    ) -> Result<Vec<CapsetInfo>> {
        let mut capsets = Vec::new();
        for index in 0..config.num_capsets {
            let resp = transport.capset_info(&GetCapsetInfo::new(index))?;
            if !resp.header.is_ok() {
                return Err(Error::OperationFailed);
            }
            match CapsetType::from_raw(resp.capset_id) {
                Some(id) => capsets.push(CapsetInfo {
                    id,
                    max_version: resp.capset_max_version,
                }),
                None => warn!("virtio-gpu: ignoring unknown capset {}", resp.capset_id),
            }
        }
        Ok(capsets)
    }

    /// Check if virgl (OpenGL) is supported
    pub fn supports_virgl_capset(&self) -> bool {
        self.capsets.iter().any(|c| c.id.is_virgl())
    }

    /// Check if Venus (Vulkan) is supported
    pub fn supports_venus(&self) -> bool {
        self.capsets.iter().any(|c| c.id == CapsetType::Venus)
    }

    /// Highest capset version the host offers for `id`
    pub fn capset_version(&self, id: CapsetType) -> Option<u32> {
        self.capsets
            .iter()
            .filter(|c| c.id == id)
            .map(|c| c.max_version)
            .max()
    }

    /// Negotiated feature bits
    pub fn features(&self) -> u64 {
        self.features
    }

    pub fn transport(&self) -> Option<&dyn VirtioTransport> {
        self.transport.as_deref()
    }

    /// Refresh rate requested via `set_preferred_refresh_rate`, 0 if unset
    pub fn refresh_rate(&self) -> u32 {
        self.state.lock().refresh_hz
    }

    pub fn vsync_enabled(&self) -> bool {
        self.state.lock().vsync
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn require_queues(&self) -> Result<()> {
        if self.state.lock().queues_ready {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl Device for VirtioGpuDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn is_mock(&self) -> bool {
        self.transport.is_none()
    }

    fn initialize_queues(&self) -> Result<()> {
        if let Some(transport) = &self.transport {
            transport.setup_queue(CONTROL_QUEUE, DEFAULT_QUEUE_SIZE)?;
            transport.setup_queue(CURSOR_QUEUE, DEFAULT_QUEUE_SIZE)?;
        }
        self.state.lock().queues_ready = true;
        Ok(())
    }

    fn setup_memory_regions(&self) -> Result<()> {
        self.require_queues()?;
        let len = match &self.transport {
            Some(transport) => transport.shared_memory_len()?,
            None => 0,
        };
        if len == 0 && self.info.capabilities.contains(DeviceCapabilities::BLOB_RESOURCES) {
            warn!("virtio-gpu: blob resources offered without a shared memory window");
        }
        self.state.lock().shared_memory = len;
        Ok(())
    }

    fn enable_3d(&self) -> Result<()> {
        self.require_queues()?;
        if !self.info.capabilities.contains(DeviceCapabilities::RENDER_3D) {
            return Err(Error::NotSupported);
        }
        self.state.lock().three_d_enabled = true;
        Ok(())
    }

    fn max_displays(&self) -> Result<u32> {
        Ok(self.config.num_scanouts.max(1))
    }

    fn max_resolution(&self) -> Result<Extent2D> {
        Ok(self.info.max_resolution)
    }

    fn supports_3d(&self) -> Result<bool> {
        if self.is_mock() {
            return Ok(true);
        }
        Ok(self.config.num_capsets > 0)
    }

    fn supports_virgl(&self) -> Result<bool> {
        Ok(self.info.capabilities.contains(DeviceCapabilities::VIRGL))
    }

    fn supports_resource_blob(&self) -> Result<bool> {
        Ok(self.config.num_capsets > 0
            && self.info.capabilities.contains(DeviceCapabilities::BLOB_RESOURCES))
    }

    fn set_optimal_queue_sizes(&self) -> Result<()> {
        self.require_queues()?;
        let Some(transport) = &self.transport else {
            return Ok(());
        };
        for queue in [CONTROL_QUEUE, CURSOR_QUEUE] {
            let max = transport.max_queue_size(queue)?;
            if max == 0 {
                return Err(Error::InvalidParameter);
            }
            // queue sizes must stay powers of two
            let size = OPTIMAL_QUEUE_SIZE.min(max);
            let size = if size.is_power_of_two() {
                size
            } else {
                1 << (15 - size.leading_zeros())
            };
            transport.setup_queue(queue, size)?;
            debug!("virtio-gpu: queue {} sized to {}", queue, size);
        }
        Ok(())
    }

    fn enable_resource_blob(&self) -> Result<()> {
        if !self.supports_resource_blob()? {
            return Err(Error::NotSupported);
        }
        let mut state = self.state.lock();
        if state.shared_memory == 0 {
            return Err(Error::NotInitialized);
        }
        state.blob_enabled = true;
        Ok(())
    }

    fn enable_virgl(&self) -> Result<()> {
        if !self.supports_virgl()? {
            return Err(Error::NotSupported);
        }
        let mut state = self.state.lock();
        if !state.three_d_enabled {
            return Err(Error::NotInitialized);
        }
        state.virgl_enabled = true;
        Ok(())
    }

    fn set_preferred_refresh_rate(&self, hz: u32) -> Result<()> {
        if hz == 0 || hz > 240 {
            return Err(Error::InvalidParameter);
        }
        self.state.lock().refresh_hz = hz;
        Ok(())
    }

    fn enable_vsync(&self, enabled: bool) -> Result<()> {
        self.state.lock().vsync = enabled;
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.require_queues()?;
        if let Some(transport) = &self.transport {
            transport.set_status(
                DeviceStatus::ACKNOWLEDGE
                    | DeviceStatus::DRIVER
                    | DeviceStatus::FEATURES_OK
                    | DeviceStatus::DRIVER_OK,
            );
        }
        self.state.lock().running = true;
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        if let Some(transport) = &self.transport {
            transport.set_status(DeviceStatus::empty());
        }
        *state = DeviceState::default();
        debug!("virtio-gpu: device stopped");
    }
}
