//! VirtIO-GPU accelerator
//!
//! Owns the 3D rendering context created on the host for the attached
//! device. Context ids come from a process-wide counter so two accelerators
//! never collide on the same host.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, info, warn};

use gal::{AccelState, Accelerator, Device, DeviceCapabilities, Result};

use crate::protocol::{CtxCreate, CtxDestroy};
use crate::transport::VirtioTransport;

/// Next context ID counter
static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a new context ID
pub fn alloc_context_id() -> u32 {
    NEXT_CONTEXT_ID.fetch_add(1, Ordering::SeqCst)
}

/// Accelerator bound to a VirtIO GPU
pub struct VirtioAccelerator {
    state: AccelState,
    device: Option<Arc<dyn Device>>,
    /// Transport used for context commands; absent for mock devices
    transport: Option<Arc<dyn VirtioTransport>>,
    context: Option<u32>,
}

impl VirtioAccelerator {
    pub fn new(transport: Option<Arc<dyn VirtioTransport>>) -> Self {
        Self {
            state: AccelState::Created,
            device: None,
            transport,
            context: None,
        }
    }

    /// Host context created by `start`, if any
    pub fn context_id(&self) -> Option<u32> {
        self.context
    }

    fn destroy_context(&mut self) {
        if let (Some(ctx), Some(transport)) = (self.context.take(), &self.transport) {
            if let Err(err) = transport.destroy_context(&CtxDestroy::new(ctx)) {
                warn!("virtio-gpu: failed to destroy context {}: {}", ctx, err);
            }
        }
    }
}

impl Accelerator for VirtioAccelerator {
    fn state(&self) -> AccelState {
        self.state
    }

    fn init(&mut self) -> Result<()> {
        self.state.expect(&[AccelState::Created, AccelState::Stopped])?;
        self.state = AccelState::Initialized;
        Ok(())
    }

    fn attach(&mut self, device: Arc<dyn Device>) -> Result<()> {
        self.state.expect(&[AccelState::Initialized])?;
        debug!("virtio-gpu: accelerator attached to {}", device.info().name);
        self.device = Some(device);
        self.state = AccelState::Attached;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.state.expect(&[AccelState::Attached, AccelState::Stopped])?;
        if self.device.is_none() {
            return Err(gal::Error::NotInitialized);
        }

        if self.capabilities().contains(DeviceCapabilities::CONTEXTS) {
            if let Some(transport) = &self.transport {
                let ctx = alloc_context_id();
                transport.create_context(&CtxCreate::new(ctx, 0, b"virtio-fbd"))?;
                self.context = Some(ctx);
            }
        }

        info!("virtio-gpu: accelerator running (context {:?})", self.context);
        self.state = AccelState::Running;
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != AccelState::Running {
            return;
        }
        self.destroy_context();
        self.state = AccelState::Stopped;
    }

    fn detach(&mut self) {
        if self.state == AccelState::Running {
            self.stop();
        }
        if self.device.take().is_some() {
            debug!("virtio-gpu: accelerator detached");
            self.state = AccelState::Initialized;
        }
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.device
            .as_ref()
            .map(|d| d.info().capabilities)
            .unwrap_or(DeviceCapabilities::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use crate::VirtioGpuDevice;

    #[test]
    fn test_lifecycle_order_enforced() {
        let mut accel = VirtioAccelerator::new(None);
        let dev: Arc<dyn Device> = Arc::new(VirtioGpuDevice::mock());
        assert!(accel.attach(dev.clone()).is_err());
        accel.init().unwrap();
        accel.attach(dev).unwrap();
        accel.start().unwrap();
        assert_eq!(accel.state(), AccelState::Running);
        // mock devices carry no contexts
        assert_eq!(accel.context_id(), None);
        accel.stop();
        accel.detach();
        assert_eq!(accel.state(), AccelState::Initialized);
        assert!(accel.capabilities().is_empty());
    }

    #[test]
    fn test_context_created_and_destroyed() {
        let transport = Arc::new(LoopbackTransport::with_virgl());
        let dev: Arc<dyn Device> = Arc::new(VirtioGpuDevice::probe(transport.clone()).unwrap());
        let mut accel = VirtioAccelerator::new(Some(transport.clone() as Arc<dyn VirtioTransport>));
        accel.init().unwrap();
        accel.attach(dev).unwrap();
        accel.start().unwrap();

        let ctx = accel.context_id().unwrap();
        assert_eq!(transport.live_contexts(), alloc::vec![ctx]);

        accel.detach();
        assert!(transport.live_contexts().is_empty());
    }
}
