// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Start/stop sequencing, acceleration fallback and the memory surface

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use gal::Extent2D;
use gal_virtio::{FailPoints, LoopbackTransport, VirtioTransport};
use pretty_assertions::assert_eq;

use virtio_fbd::aperture::Aperture;
use virtio_fbd::memory::{HeapMemory, MemoryRegion};
use virtio_fbd::properties::{NullPublisher, PropertyTable, PropertyValue};
use virtio_fbd::vbe::{SimulatedDispi, VbeDisplayBus, MIB};
use virtio_fbd::{
    CustomModeData, DeviceIdentity, DriverConfig, Error, Framebuffer, InterruptProc,
    InterruptType, LifecycleState, Status,
};

const LFB: u64 = 0xE000_0000;

struct Rig {
    max: Extent2D,
    vram: u64,
    identity: DeviceIdentity,
    config: DriverConfig,
    transport: Option<Arc<dyn VirtioTransport>>,
    absent: bool,
}

impl Rig {
    fn new() -> Self {
        Self {
            max: Extent2D::new(1920, 1080),
            vram: 16 * MIB,
            identity: DeviceIdentity::new(0x1AF4, 0x1050),
            config: DriverConfig {
                clear_settle: Duration::ZERO,
                ..DriverConfig::default()
            },
            transport: None,
            absent: false,
        }
    }

    fn build(self) -> (Framebuffer, Arc<HeapMemory>) {
        let port = if self.absent {
            SimulatedDispi::absent()
        } else {
            SimulatedDispi::new(self.max, Extent2D::new(1024, 768))
        };
        let region = Arc::new(HeapMemory::new(LFB, self.vram as usize));
        let bus = VbeDisplayBus::new(Box::new(port), region.clone(), self.vram);
        let fb = Framebuffer::new(
            self.identity,
            Box::new(bus),
            self.config,
            Arc::new(NullPublisher),
            self.transport,
        );
        (fb, region)
    }
}

#[test]
fn test_too_few_modes_fails_start() {
    let (fb, _) = Rig {
        max: Extent2D::new(1024, 768),
        ..Rig::new()
    }
    .build();
    assert_matches!(fb.start(), Err(Error::InsufficientModes { count: 2 }));
    assert_eq!(fb.state(), LifecycleState::Failed);
    assert_matches!(fb.display_modes(), Err(Error::NotRunning));

    // stopping a failed driver releases what is left
    fb.stop();
    assert_eq!(fb.state(), LifecycleState::Stopped);
}

#[test]
fn test_missing_adapter_fails_start() {
    let (fb, _) = Rig {
        absent: true,
        ..Rig::new()
    }
    .build();
    let res = fb.start();
    assert_eq!(Status::from(&res), Status::Error);
    assert_matches!(res, Err(Error::Bus(_)));
    assert_eq!(fb.state(), LifecycleState::Failed);
}

#[test]
fn test_real_acceleration_torn_down_on_drop() {
    let loopback = Arc::new(LoopbackTransport::with_virgl());
    let (fb, _) = Rig {
        identity: DeviceIdentity::new(0x1AF4, 0x1051),
        transport: Some(loopback.clone() as Arc<dyn VirtioTransport>),
        ..Rig::new()
    }
    .build();
    fb.start().unwrap();
    assert_eq!(fb.acceleration().as_deref(), Some("real"));
    let virgl = fb
        .with_acceleration(|backend| backend.accel().map(|a| a.capabilities().virgl()))
        .unwrap();
    assert_eq!(virgl, Some(true));
    assert_eq!(loopback.live_contexts().len(), 1);

    drop(fb);
    assert!(loopback.live_contexts().is_empty());
}

#[test]
fn test_transport_failure_falls_back_to_mock() {
    let loopback = LoopbackTransport::with_virgl().failing(FailPoints::FEATURES);
    let (fb, _) = Rig {
        transport: Some(Arc::new(loopback) as Arc<dyn VirtioTransport>),
        ..Rig::new()
    }
    .build();
    fb.start().unwrap();
    assert_eq!(fb.state(), LifecycleState::Running);
    assert_eq!(fb.acceleration().as_deref(), Some("mock"));
}

#[test]
fn test_acceleration_disabled_by_config() {
    let mut rig = Rig::new();
    rig.config.enable_acceleration = false;
    rig.transport = Some(Arc::new(LoopbackTransport::with_virgl()) as Arc<dyn VirtioTransport>);
    let (fb, _) = rig.build();
    fb.start().unwrap();
    assert_eq!(fb.acceleration().as_deref(), Some("disabled"));
}

#[test]
fn test_stop_clears_visible_framebuffer() {
    let (fb, region) = Rig::new().build();
    fb.start().unwrap();
    let vram = fb.vram_range().unwrap();
    assert_eq!(vram.len(), 16 * MIB);
    vram.fill(0, vram.len(), 0x5A).unwrap();

    fb.stop();
    assert_eq!(fb.state(), LifecycleState::Stopped);
    assert!(fb.vram_range().is_none());

    let visible = 1024 * 768 * 4;
    let mut head = [0xFFu8; 16];
    region.read(0, &mut head).unwrap();
    assert_eq!(head, [0u8; 16]);
    let mut tail = [0xFFu8; 2];
    region.read(visible - 1, &mut tail).unwrap();
    // last visible byte cleared, the one after it untouched
    assert_eq!(tail, [0x00, 0x5A]);
}

#[test]
fn test_apertures() {
    let (fb, _) = Rig::new().build();
    fb.start().unwrap();
    let system = fb.aperture_range(Aperture::System).unwrap();
    assert_eq!(system.address(), LFB);
    assert_eq!(system.len(), 1024 * 4 * 768);
    assert!(fb.aperture_range(Aperture::Other(1)).is_none());
}

#[test]
fn test_ioctl_rejects_bad_buffers() {
    let (fb, _) = Rig::new().build();
    fb.start().unwrap();
    let input = CustomModeData {
        flags: CustomModeData::SET,
        width: 1280,
        height: 720,
    };
    let bytes = bytemuck::bytes_of(&input);
    let mut out = [0u8; CustomModeData::SIZE];
    let mut short = [0u8; CustomModeData::SIZE - 1];

    assert_matches!(fb.custom_mode(None, Some(&mut out[..])), Err(Error::BadArgument(_)));
    assert_matches!(fb.custom_mode(Some(bytes), None), Err(Error::BadArgument(_)));
    assert_matches!(
        fb.custom_mode(Some(&bytes[..8]), Some(&mut out[..])),
        Err(Error::BadArgument(_))
    );
    let res = fb.custom_mode(Some(bytes), Some(&mut short[..]));
    assert_eq!(Status::from(&res), Status::BadArgument);
    assert_eq!(out, [0u8; CustomModeData::SIZE]);
}

#[test]
fn test_only_connect_interrupts() {
    let (fb, _) = Rig::new().build();
    let cb: InterruptProc = Arc::new(|_| {});
    let res = fb.register_interrupt(InterruptType::VerticalBlank, cb.clone(), 0);
    assert_eq!(Status::from(&res), Status::Unsupported);

    let r = fb.register_interrupt(InterruptType::Connect, cb, 0).unwrap();
    fb.set_interrupt_state(r, false).unwrap();
    fb.unregister_interrupt(r).unwrap();
    assert_matches!(fb.unregister_interrupt(r), Err(Error::BadArgument(_)));
}

#[test]
fn test_start_publishes_descriptor() {
    let table = Arc::new(PropertyTable::new());
    let port = SimulatedDispi::new(Extent2D::new(1920, 1080), Extent2D::new(1024, 768));
    let region = Arc::new(HeapMemory::new(LFB, 16 * MIB as usize));
    let identity = DeviceIdentity::new(0x1414, 0x5353).with_subsystem(0x1414, 0xDDA2);
    let fb = Framebuffer::new(
        identity,
        Box::new(VbeDisplayBus::new(Box::new(port), region, 16 * MIB)),
        DriverConfig::default(),
        table.clone(),
        None,
    );
    fb.start().unwrap();
    assert_eq!(
        table.get("model"),
        Some(PropertyValue::Str("Microsoft Hyper-V Synthetic Video".into()))
    );
    assert_eq!(table.get("dda-passthrough"), Some(PropertyValue::Bool(true)));
    assert_eq!(table.get("vendor-id"), Some(PropertyValue::Num(0x1414)));
    assert!(fb.profile().dda_passthrough);
}
