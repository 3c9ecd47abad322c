// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Capability negotiation
//!
//! Every query and every setting is attempted on its own. A failure is
//! logged and recorded, never propagated, so one misbehaving knob cannot
//! keep the adapter from coming up.

use std::fmt;

use gal::{Device, Extent2D};
use log::{debug, info, warn};

use crate::classify::DeviceProfile;
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::pci::DeviceIdentity;
use crate::properties::DescriptorPublisher;

/// What the device answered; `None` where the query failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub max_displays: Option<u32>,
    pub max_resolution: Option<Extent2D>,
    pub supports_3d: Option<bool>,
    pub supports_virgl: Option<bool>,
    pub supports_resource_blob: Option<bool>,
}

impl CapabilitySet {
    /// Every query failed
    pub fn is_unknown(&self) -> bool {
        *self == CapabilitySet::default()
    }

    pub fn virgl(&self) -> bool {
        self.supports_virgl.unwrap_or(false)
    }

    pub fn resource_blob(&self) -> bool {
        self.supports_resource_blob.unwrap_or(false)
    }
}

fn query<T>(what: &str, res: gal::Result<T>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(err) => {
            warn!("virtio-fbd: {} query failed: {}", what, err);
            None
        }
    }
}

pub fn query_capabilities(device: &dyn Device) -> CapabilitySet {
    let caps = CapabilitySet {
        max_displays: query("max displays", device.max_displays()),
        max_resolution: query("max resolution", device.max_resolution()),
        supports_3d: query("3D support", device.supports_3d()),
        supports_virgl: query("Virgl support", device.supports_virgl()),
        supports_resource_blob: query("resource blob support", device.supports_resource_blob()),
    };
    debug!("virtio-fbd: capabilities {:?}", caps);
    caps
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PublishDescriptor,
    QueueSizes,
    ResourceBlob,
    Virgl,
    RefreshRate,
    Vsync,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
    Failed(String),
}

/// Per-step result of [`apply_optimal_settings`], in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsReport {
    pub steps: Vec<(Step, Outcome)>,
}

impl SettingsReport {
    fn record(&mut self, step: Step, res: Option<Result<()>>) {
        let outcome = match res {
            None => Outcome::Skipped,
            Some(Ok(())) => Outcome::Applied,
            Some(Err(err)) => {
                warn!("virtio-fbd: {:?} failed: {}", step, err);
                Outcome::Failed(err.to_string())
            }
        };
        self.steps.push((step, outcome));
    }

    pub fn outcome(&self, step: Step) -> Option<&Outcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    pub fn applied(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, o)| *o == Outcome::Applied)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Failed(_)))
            .count()
    }
}

impl fmt::Display for SettingsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} failed, {} skipped",
            self.applied(),
            self.failed(),
            self.steps.len() - self.applied() - self.failed()
        )
    }
}

/// Describe the device to the host
pub fn publish_descriptor(
    publisher: &dyn DescriptorPublisher,
    identity: DeviceIdentity,
    profile: &DeviceProfile,
    caps: &CapabilitySet,
) {
    publisher.publish_num("vendor-id", identity.vendor_id as u64);
    publisher.publish_num("device-id", identity.device_id as u64);
    publisher.publish_num("subsystem-vendor-id", identity.subsystem_vendor_id as u64);
    publisher.publish_num("subsystem-id", identity.subsystem_id as u64);
    publisher.publish_bool("dda-passthrough", profile.dda_passthrough);
    publisher.publish_bool("3d", caps.supports_3d.unwrap_or(false));
    publisher.publish_bool("virgl", caps.virgl());
    publisher.publish_bool("resource-blob", caps.resource_blob());
    if let Some(n) = caps.max_displays {
        publisher.publish_num("max-displays", n as u64);
    }
    if let Some(res) = caps.max_resolution {
        publisher.publish_str("max-resolution", &res.to_string());
    }
}

/// Push the device toward the best configuration it claims to support
///
/// Step failures only show up in the report. The one error is a device
/// that answered none of the capability queries.
pub fn apply_optimal_settings(
    device: &dyn Device,
    caps: &CapabilitySet,
    config: &DriverConfig,
    publisher: &dyn DescriptorPublisher,
    identity: DeviceIdentity,
    profile: &DeviceProfile,
) -> Result<SettingsReport> {
    if caps.is_unknown() {
        return Err(Error::Device(gal::Error::DeviceLost));
    }
    let mut report = SettingsReport::default();

    publish_descriptor(publisher, identity, profile, caps);
    report.record(Step::PublishDescriptor, Some(Ok(())));

    report.record(
        Step::QueueSizes,
        Some(device.set_optimal_queue_sizes().map_err(Into::into)),
    );
    report.record(
        Step::ResourceBlob,
        caps.resource_blob()
            .then(|| device.enable_resource_blob().map_err(Into::into)),
    );
    report.record(
        Step::Virgl,
        caps.virgl().then(|| device.enable_virgl().map_err(Into::into)),
    );
    report.record(
        Step::RefreshRate,
        Some(
            device
                .set_preferred_refresh_rate(config.refresh_rate)
                .map_err(Into::into),
        ),
    );
    report.record(
        Step::Vsync,
        Some(device.enable_vsync(config.vsync).map_err(Into::into)),
    );

    info!("virtio-fbd: optimal settings: {}", report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::properties::{PropertyTable, PropertyValue};
    use gal::Error as GalError;
    use gal_virtio::{LoopbackTransport, VirtioGpuDevice, VirtioTransport};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn virgl_device() -> VirtioGpuDevice {
        let transport: Arc<dyn VirtioTransport> = Arc::new(LoopbackTransport::with_virgl());
        let device = VirtioGpuDevice::probe(transport).unwrap();
        device.initialize_queues().unwrap();
        device.setup_memory_regions().unwrap();
        device.enable_3d().unwrap();
        device
    }

    #[test]
    fn test_query_virgl_device() {
        let caps = query_capabilities(&virgl_device());
        assert_eq!(caps.supports_3d, Some(true));
        assert!(caps.virgl());
        assert!(caps.resource_blob());
        assert!(caps.max_displays.unwrap() >= 1);
    }

    #[test]
    fn test_all_steps_applied() {
        let device = virgl_device();
        let caps = query_capabilities(&device);
        let table = PropertyTable::new();
        let id = DeviceIdentity::new(0x1AF4, 0x1051);
        let report = apply_optimal_settings(
            &device,
            &caps,
            &DriverConfig::default(),
            &table,
            id,
            &classify(id),
        )
        .unwrap();
        assert_eq!(report.failed(), 0);
        assert_eq!(report.applied(), 6);
        assert!(device.vsync_enabled());
        assert_eq!(table.get("virgl"), Some(PropertyValue::Bool(true)));
        assert_eq!(table.get("device-id"), Some(PropertyValue::Num(0x1051)));
    }

    #[test]
    fn test_failures_do_not_stop_negotiation() {
        // mock device: no virgl or blob, bad refresh rate
        let device = VirtioGpuDevice::mock();
        device.initialize_queues().unwrap();
        let caps = query_capabilities(&device);
        let config = DriverConfig {
            refresh_rate: 0,
            ..DriverConfig::default()
        };
        let id = DeviceIdentity::new(0x1234, 0x1111);
        let report = apply_optimal_settings(
            &device,
            &caps,
            &config,
            &PropertyTable::new(),
            id,
            &classify(id),
        )
        .unwrap();
        assert_eq!(report.outcome(Step::ResourceBlob), Some(&Outcome::Skipped));
        assert_eq!(report.outcome(Step::Virgl), Some(&Outcome::Skipped));
        assert_eq!(
            report.outcome(Step::RefreshRate),
            Some(&Outcome::Failed(
                Error::Device(GalError::InvalidParameter).to_string()
            ))
        );
        assert_eq!(report.outcome(Step::Vsync), Some(&Outcome::Applied));
    }

    #[test]
    fn test_silent_device_rejected() {
        let device = VirtioGpuDevice::mock();
        let id = DeviceIdentity::new(0x1AF4, 0x1050);
        let res = apply_optimal_settings(
            &device,
            &CapabilitySet::default(),
            &DriverConfig::default(),
            &PropertyTable::new(),
            id,
            &classify(id),
        );
        assert!(matches!(res, Err(Error::Device(GalError::DeviceLost))));
    }
}
