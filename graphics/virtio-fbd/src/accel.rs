// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! 3D acceleration bring-up with real → mock → disabled fallback

use std::fmt;
use std::sync::Arc;

use gal::{AccelState, Accelerator, Device};
use gal_virtio::{VirtioAccelerator, VirtioGpuDevice, VirtioTransport};
use log::{info, warn};

use crate::capability::{self, CapabilitySet, SettingsReport};
use crate::classify::DeviceProfile;
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::pci::DeviceIdentity;
use crate::properties::DescriptorPublisher;

/// A device with its accelerator attached and running
pub struct Accel {
    device: Arc<dyn Device>,
    accelerator: Box<dyn Accelerator>,
    caps: CapabilitySet,
    settings: Option<SettingsReport>,
}

impl Accel {
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn accelerator_state(&self) -> AccelState {
        self.accelerator.state()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.caps
    }

    pub fn settings(&self) -> Option<&SettingsReport> {
        self.settings.as_ref()
    }

    fn shutdown(mut self) {
        self.accelerator.stop();
        self.accelerator.detach();
        self.device.stop();
    }
}

pub enum AccelerationBackend {
    Real(Accel),
    /// Capability-limited stand-in after the real device failed
    Mock(Accel),
    Disabled,
}

/// Everything bring-up needs to know about the adapter
pub struct BringUp<'a> {
    pub identity: DeviceIdentity,
    pub profile: &'a DeviceProfile,
    pub transport: Option<Arc<dyn VirtioTransport>>,
    pub config: &'a DriverConfig,
    pub publisher: &'a dyn DescriptorPublisher,
}

impl AccelerationBackend {
    pub fn bring_up(ctx: BringUp<'_>) -> Self {
        if !ctx.config.enable_acceleration {
            info!("virtio-fbd: acceleration disabled by configuration");
            return AccelerationBackend::Disabled;
        }

        let (device, transport) = match probe_real(ctx.profile, ctx.transport.as_ref()) {
            Ok(device) => (Arc::new(device) as Arc<dyn Device>, ctx.transport.clone()),
            Err(err) => {
                warn!("virtio-fbd: using mock device: {}", err);
                let device = VirtioGpuDevice::mock();
                if let Err(err) = init_device(&device) {
                    warn!("virtio-fbd: mock device failed, acceleration disabled: {}", err);
                    return AccelerationBackend::Disabled;
                }
                (Arc::new(device) as Arc<dyn Device>, None)
            }
        };
        let real = !device.is_mock();

        let caps = capability::query_capabilities(device.as_ref());
        let settings = match capability::apply_optimal_settings(
            device.as_ref(),
            &caps,
            ctx.config,
            ctx.publisher,
            ctx.identity,
            ctx.profile,
        ) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!("virtio-fbd: settings not applied: {}", err);
                None
            }
        };

        let accelerator = match start_accelerator(&device, transport) {
            Ok(accelerator) => accelerator,
            Err(err) => {
                warn!("virtio-fbd: accelerator failed, acceleration disabled: {}", err);
                device.stop();
                return AccelerationBackend::Disabled;
            }
        };

        let accel = Accel {
            device,
            accelerator,
            caps,
            settings,
        };
        info!(
            "virtio-fbd: acceleration up on {} ({})",
            accel.device.info().name,
            if real { "real" } else { "mock" }
        );
        if real {
            AccelerationBackend::Real(accel)
        } else {
            AccelerationBackend::Mock(accel)
        }
    }

    pub fn accel(&self) -> Option<&Accel> {
        match self {
            AccelerationBackend::Real(accel) | AccelerationBackend::Mock(accel) => Some(accel),
            AccelerationBackend::Disabled => None,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, AccelerationBackend::Real(_))
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, AccelerationBackend::Mock(_))
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, AccelerationBackend::Disabled)
    }

    /// Stop and detach the accelerator, then stop the device
    pub fn teardown(&mut self) {
        match std::mem::replace(self, AccelerationBackend::Disabled) {
            AccelerationBackend::Real(accel) | AccelerationBackend::Mock(accel) => {
                accel.shutdown();
                info!("virtio-fbd: acceleration torn down");
            }
            AccelerationBackend::Disabled => {}
        }
    }
}

impl fmt::Display for AccelerationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccelerationBackend::Real(_) => write!(f, "real"),
            AccelerationBackend::Mock(_) => write!(f, "mock"),
            AccelerationBackend::Disabled => write!(f, "disabled"),
        }
    }
}

fn probe_real(
    profile: &DeviceProfile,
    transport: Option<&Arc<dyn VirtioTransport>>,
) -> Result<VirtioGpuDevice> {
    if !profile.is_virtio_gpu() {
        return Err(Error::Unsupported);
    }
    let transport = transport.ok_or(Error::Unsupported)?;
    let device = VirtioGpuDevice::probe(Arc::clone(transport))?;
    init_device(&device)?;
    Ok(device)
}

fn init_device(device: &dyn Device) -> gal::Result<()> {
    device.initialize_queues()?;
    device.setup_memory_regions()?;
    if device.supports_3d()? {
        device.enable_3d()?;
    }
    device.start()
}

fn start_accelerator(
    device: &Arc<dyn Device>,
    transport: Option<Arc<dyn VirtioTransport>>,
) -> gal::Result<Box<dyn Accelerator>> {
    let mut accelerator: Box<dyn Accelerator> = Box::new(VirtioAccelerator::new(transport));
    accelerator.init()?;
    accelerator.attach(Arc::clone(device))?;
    if let Err(err) = accelerator.start() {
        accelerator.detach();
        return Err(err);
    }
    Ok(accelerator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::properties::{NullPublisher, PropertyTable, PropertyValue};
    use gal_virtio::{FailPoints, LoopbackTransport};

    fn bring_up(
        id: DeviceIdentity,
        transport: Option<Arc<dyn VirtioTransport>>,
        config: &DriverConfig,
        publisher: &dyn DescriptorPublisher,
    ) -> AccelerationBackend {
        let profile = classify(id);
        AccelerationBackend::bring_up(BringUp {
            identity: id,
            profile: &profile,
            transport,
            config,
            publisher,
        })
    }

    #[test]
    fn test_real_virgl_backend() {
        let loopback = Arc::new(LoopbackTransport::with_virgl());
        let table = PropertyTable::new();
        let mut backend = bring_up(
            DeviceIdentity::new(0x1AF4, 0x1051),
            Some(loopback.clone() as Arc<dyn VirtioTransport>),
            &DriverConfig::default(),
            &table,
        );
        assert!(backend.is_real());
        let accel = backend.accel().unwrap();
        assert_eq!(accel.accelerator_state(), AccelState::Running);
        assert!(accel.capabilities().virgl());
        assert_eq!(loopback.live_contexts().len(), 1);
        assert_eq!(table.get("virgl"), Some(PropertyValue::Bool(true)));

        backend.teardown();
        assert!(backend.is_disabled());
        assert!(loopback.live_contexts().is_empty());
    }

    #[test]
    fn test_transport_failure_falls_back_to_mock() {
        let loopback = LoopbackTransport::with_virgl().failing(FailPoints::CONFIG);
        let backend = bring_up(
            DeviceIdentity::new(0x1AF4, 0x1050),
            Some(Arc::new(loopback) as Arc<dyn VirtioTransport>),
            &DriverConfig::default(),
            &NullPublisher,
        );
        assert!(backend.is_mock());
        assert!(backend.accel().unwrap().device().is_mock());
    }

    #[test]
    fn test_non_virtio_family_uses_mock() {
        let backend = bring_up(
            DeviceIdentity::new(0x15AD, 0x0405),
            Some(Arc::new(LoopbackTransport::with_virgl()) as Arc<dyn VirtioTransport>),
            &DriverConfig::default(),
            &NullPublisher,
        );
        assert!(backend.is_mock());
    }

    #[test]
    fn test_disabled_by_config() {
        let config = DriverConfig {
            enable_acceleration: false,
            ..DriverConfig::default()
        };
        let mut backend = bring_up(DeviceIdentity::new(0x1AF4, 0x1050), None, &config, &NullPublisher);
        assert!(backend.is_disabled());
        assert!(backend.accel().is_none());
        // tearing down nothing is fine
        backend.teardown();
        assert_eq!(backend.to_string(), "disabled");
    }

    #[test]
    fn test_context_failure_disables() {
        let loopback = LoopbackTransport::with_virgl().failing(FailPoints::CONTEXT);
        let backend = bring_up(
            DeviceIdentity::new(0x1AF4, 0x1051),
            Some(Arc::new(loopback) as Arc<dyn VirtioTransport>),
            &DriverConfig::default(),
            &NullPublisher,
        );
        assert!(backend.is_disabled());
    }
}
