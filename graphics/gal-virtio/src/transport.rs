//! Transport abstraction
//!
//! The device talks to the host through a `VirtioTransport`: feature
//! negotiation, the device config space, virtqueue setup and the handful of
//! control commands used during bring-up. `LoopbackTransport` answers all of
//! them from memory and can be told to fail individual operations.

use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;
use spin::Mutex;

use gal::{Error, Result};

use crate::protocol::{
    features, CapsetType, CtxCreate, CtxDestroy, DeviceStatus, GetCapsetInfo, GpuConfig,
    RespCapsetInfo, MAX_SCANOUTS,
};

/// Host-side access to a VirtIO GPU
pub trait VirtioTransport: Send + Sync {
    /// Feature bits offered by the device
    fn device_features(&self) -> Result<u64>;

    /// Accept a subset of the offered features
    fn ack_features(&self, features: u64) -> Result<()>;

    /// Write the device status register
    fn set_status(&self, status: DeviceStatus);

    /// Read `struct virtio_gpu_config`
    fn read_config(&self) -> Result<GpuConfig>;

    /// Largest size the device accepts for `queue`
    fn max_queue_size(&self, queue: u16) -> Result<u16>;

    /// Allocate and enable a virtqueue
    fn setup_queue(&self, queue: u16, size: u16) -> Result<()>;

    /// Length of the host-visible shared memory window, 0 if absent
    fn shared_memory_len(&self) -> Result<u64>;

    fn capset_info(&self, request: &GetCapsetInfo) -> Result<RespCapsetInfo>;

    fn create_context(&self, request: &CtxCreate) -> Result<()>;

    fn destroy_context(&self, request: &CtxDestroy) -> Result<()>;
}

bitflags! {
    /// Operations a `LoopbackTransport` should fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FailPoints: u32 {
        const FEATURES = 1 << 0;
        const CONFIG = 1 << 1;
        const QUEUE_SETUP = 1 << 2;
        const QUEUE_SIZE = 1 << 3;
        const SHARED_MEMORY = 1 << 4;
        const CAPSET_INFO = 1 << 5;
        const CONTEXT = 1 << 6;
    }
}

/// In-memory transport used by simulated buses and tests
pub struct LoopbackTransport {
    features: u64,
    config: GpuConfig,
    capsets: Vec<CapsetType>,
    max_queue_size: u16,
    shm_len: u64,
    fail: FailPoints,
    status: AtomicU8,
    state: Mutex<LoopbackState>,
}

#[derive(Default)]
struct LoopbackState {
    acked_features: u64,
    queue_sizes: [u16; 2],
    contexts: Vec<u32>,
}

impl LoopbackTransport {
    /// A plain 2D device with one scanout
    pub fn new() -> Self {
        Self {
            features: features::EDID,
            config: GpuConfig {
                num_scanouts: 1,
                ..GpuConfig::default()
            },
            capsets: Vec::new(),
            max_queue_size: 1024,
            shm_len: 0,
            fail: FailPoints::empty(),
            status: AtomicU8::new(0),
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// A virgl-capable device with blob resources and a shared memory window
    pub fn with_virgl() -> Self {
        Self::new()
            .features(features::SUPPORTED)
            .capsets(&[CapsetType::Virgl, CapsetType::Virgl2])
            .shared_memory(256 * 1024 * 1024)
    }

    pub fn features(mut self, features: u64) -> Self {
        self.features = features;
        self
    }

    pub fn scanouts(mut self, count: u32) -> Self {
        self.config.num_scanouts = count.min(MAX_SCANOUTS as u32);
        self
    }

    pub fn capsets(mut self, capsets: &[CapsetType]) -> Self {
        self.capsets = capsets.to_vec();
        self.config.num_capsets = capsets.len() as u32;
        self
    }

    pub fn shared_memory(mut self, len: u64) -> Self {
        self.shm_len = len;
        self
    }

    pub fn failing(mut self, fail: FailPoints) -> Self {
        self.fail = fail;
        self
    }

    /// Last status written by the driver
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from_bits_truncate(self.status.load(Ordering::SeqCst))
    }

    pub fn acked_features(&self) -> u64 {
        self.state.lock().acked_features
    }

    pub fn queue_size(&self, queue: u16) -> u16 {
        self.state
            .lock()
            .queue_sizes
            .get(queue as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Contexts currently alive on the host side
    pub fn live_contexts(&self) -> Vec<u32> {
        self.state.lock().contexts.clone()
    }

    fn check(&self, point: FailPoints, what: &str) -> Result<()> {
        if self.fail.contains(point) {
            Err(Error::TransportError(String::from(what)))
        } else {
            Ok(())
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtioTransport for LoopbackTransport {
    fn device_features(&self) -> Result<u64> {
        self.check(FailPoints::FEATURES, "device features")?;
        Ok(self.features)
    }

    fn ack_features(&self, features: u64) -> Result<()> {
        self.check(FailPoints::FEATURES, "feature ack")?;
        if features & !self.features != 0 {
            return Err(Error::InvalidParameter);
        }
        self.state.lock().acked_features = features;
        Ok(())
    }

    fn set_status(&self, status: DeviceStatus) {
        self.status.store(status.bits(), Ordering::SeqCst);
    }

    fn read_config(&self) -> Result<GpuConfig> {
        self.check(FailPoints::CONFIG, "config space")?;
        Ok(self.config)
    }

    fn max_queue_size(&self, queue: u16) -> Result<u16> {
        self.check(FailPoints::QUEUE_SIZE, "queue size")?;
        if queue > 1 {
            return Err(Error::InvalidParameter);
        }
        Ok(self.max_queue_size)
    }

    fn setup_queue(&self, queue: u16, size: u16) -> Result<()> {
        self.check(FailPoints::QUEUE_SETUP, "queue setup")?;
        if queue > 1 || size == 0 || size > self.max_queue_size || !size.is_power_of_two() {
            return Err(Error::InvalidParameter);
        }
        self.state.lock().queue_sizes[queue as usize] = size;
        Ok(())
    }

    fn shared_memory_len(&self) -> Result<u64> {
        self.check(FailPoints::SHARED_MEMORY, "shared memory")?;
        Ok(self.shm_len)
    }

    fn capset_info(&self, request: &GetCapsetInfo) -> Result<RespCapsetInfo> {
        self.check(FailPoints::CAPSET_INFO, "capset info")?;
        let capset = self
            .capsets
            .get(request.capset_index as usize)
            .copied()
            .ok_or(Error::InvalidParameter)?;
        Ok(RespCapsetInfo::ok(capset, 2, 4096))
    }

    fn create_context(&self, request: &CtxCreate) -> Result<()> {
        self.check(FailPoints::CONTEXT, "context create")?;
        self.state.lock().contexts.push(request.header.ctx_id);
        Ok(())
    }

    fn destroy_context(&self, request: &CtxDestroy) -> Result<()> {
        self.check(FailPoints::CONTEXT, "context destroy")?;
        let mut state = self.state.lock();
        let before = state.contexts.len();
        state.contexts.retain(|&id| id != request.header.ctx_id);
        if state.contexts.len() == before {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_rejects_unoffered_features() {
        let t = LoopbackTransport::new();
        assert_eq!(
            t.ack_features(features::RESOURCE_BLOB),
            Err(Error::InvalidParameter)
        );
        assert!(t.ack_features(features::EDID).is_ok());
        assert_eq!(t.acked_features(), features::EDID);
    }

    #[test]
    fn test_loopback_fail_points() {
        let t = LoopbackTransport::new().failing(FailPoints::CONFIG);
        assert!(matches!(t.read_config(), Err(Error::TransportError(_))));
        assert!(t.device_features().is_ok());
    }

    #[test]
    fn test_loopback_queue_setup_validates_size() {
        let t = LoopbackTransport::new();
        assert!(t.setup_queue(0, 100).is_err());
        assert!(t.setup_queue(0, 256).is_ok());
        assert_eq!(t.queue_size(0), 256);
    }

    #[test]
    fn test_loopback_capsets() {
        let t = LoopbackTransport::with_virgl();
        assert_eq!(t.read_config().unwrap().num_capsets, 2);
        let resp = t.capset_info(&GetCapsetInfo::new(1)).unwrap();
        assert!(resp.header.is_ok());
        assert_eq!(resp.capset_id, CapsetType::Virgl2 as u32);
        assert!(t.capset_info(&GetCapsetInfo::new(2)).is_err());
    }
}
