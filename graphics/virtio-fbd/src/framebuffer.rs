// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Framebuffer lifecycle and the entry points exposed to the host
//!
//! ```text
//! NotStarted → Probing → Starting → Running → Stopping → Stopped
//!                            └──────► Failed ──────┘
//! ```

use std::mem;
use std::sync::Arc;
use std::thread;

use bytemuck::{Pod, Zeroable};
use gal::Extent2D;
use gal_virtio::VirtioTransport;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::accel::{AccelerationBackend, BringUp};
use crate::aperture::{Aperture, ApertureManager};
use crate::bus::{bytes_per_row, DisplayBus};
use crate::classify::{self, DeviceProfile};
use crate::config::DriverConfig;
use crate::display::{DisplayState, SharedDisplay, SwitchStep};
use crate::error::{Error, Result};
use crate::memory::MemoryRange;
use crate::modes::{self, ActiveModeSet, ModeFlags, ModeId};
use crate::notify::{ConnectionNotifier, InterruptProc, InterruptRef, InterruptType};
use crate::pci::DeviceIdentity;
use crate::properties::DescriptorPublisher;
use crate::switch::{self, ModeSwitch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Probing,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Framebuffer attributes a client may set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Display captured by a client; clearing it acknowledges a custom switch
    Captured,
    /// Whether VRAM contents are saved across sleep
    VramSave,
    Power,
    Other(u32),
}

/// Per-connection attributes a client may query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAttribute {
    Enable,
    Flags,
    Changed,
    SupportsAppleSense,
    SupportsLlddcSense,
    SupportsHlddcSense,
    DisplayParameterCount,
    DisplayParameters,
    Power,
    PostWake,
}

/// Custom-mode ioctl payload, in and out
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CustomModeData {
    pub flags: u32,
    pub width: u32,
    pub height: u32,
}

impl CustomModeData {
    /// Perform a switch rather than just report the current geometry
    pub const SET: u32 = 1;

    pub const SIZE: usize = mem::size_of::<CustomModeData>();
}

/// Refresh rate reported for every mode, 16.16 fixed point
pub const REFRESH_RATE_60HZ: u32 = 60 << 16;

/// The only pixel format: 32-bit direct RGB
pub const PIXEL_FORMAT_32BPP: &str = "--------RRRRRRRRGGGGGGGGBBBBBBBB";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInformation {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub max_depth_index: u32,
    pub flags: ModeFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelInformation {
    pub active_width: u32,
    pub active_height: u32,
    pub bytes_per_row: u32,
    pub bits_per_pixel: u32,
    pub component_count: u32,
    pub bits_per_component: u32,
    /// Red, green, blue
    pub component_masks: [u32; 3],
    pub pixel_format: &'static str,
    pub flags: ModeFlags,
}

/// Resources that exist only between a successful start and stop
struct Running {
    display: Arc<SharedDisplay>,
    switch: ModeSwitch,
    apertures: ApertureManager,
    accel: Mutex<AccelerationBackend>,
}

pub struct Framebuffer {
    identity: DeviceIdentity,
    config: DriverConfig,
    publisher: Arc<dyn DescriptorPublisher>,
    transport: Option<Arc<dyn VirtioTransport>>,
    notifier: Arc<ConnectionNotifier>,
    lifecycle: Mutex<LifecycleState>,
    bus: Mutex<Option<Box<dyn DisplayBus>>>,
    running: Mutex<Option<Arc<Running>>>,
}

impl Framebuffer {
    pub fn new(
        identity: DeviceIdentity,
        bus: Box<dyn DisplayBus>,
        config: DriverConfig,
        publisher: Arc<dyn DescriptorPublisher>,
        transport: Option<Arc<dyn VirtioTransport>>,
    ) -> Self {
        Self {
            identity,
            config,
            publisher,
            transport,
            notifier: Arc::new(ConnectionNotifier::new()),
            lifecycle: Mutex::new(LifecycleState::NotStarted),
            bus: Mutex::new(Some(bus)),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.lifecycle.lock()
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn profile(&self) -> DeviceProfile {
        classify::classify(self.identity)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn set_state(&self, state: LifecycleState) {
        let mut lifecycle = self.lifecycle.lock();
        debug!("virtio-fbd: {:?} -> {:?}", *lifecycle, state);
        *lifecycle = state;
    }

    fn running(&self) -> Result<Arc<Running>> {
        self.running.lock().clone().ok_or(Error::NotRunning)
    }

    /// Probe the device and bring the display up
    pub fn start(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle != LifecycleState::NotStarted {
                return Err(Error::BadArgument("framebuffer already started"));
            }
            *lifecycle = LifecycleState::Probing;
        }

        let profile = classify::classify(self.identity);
        info!("virtio-fbd: {} at {}", profile, self.identity);
        if !profile.recognized {
            warn!("virtio-fbd: unrecognized adapter {}", self.identity);
        }
        self.publisher.publish_str("model", &profile.model_name());
        self.publisher
            .publish_str("family", &format!("{:?}", profile.family));

        self.set_state(LifecycleState::Starting);
        match self.bring_up(&profile) {
            Ok(running) => {
                info!(
                    "virtio-fbd: running, {} modes, acceleration {}",
                    running.display.lock().active.len(),
                    running.accel.lock()
                );
                *self.running.lock() = Some(Arc::new(running));
                self.set_state(LifecycleState::Running);
                Ok(())
            }
            Err(err) => {
                error!("virtio-fbd: start failed: {}", err);
                self.set_state(LifecycleState::Failed);
                Err(err)
            }
        }
    }

    fn bring_up(&self, profile: &DeviceProfile) -> Result<Running> {
        let mut bus = self.bus.lock().take().ok_or(Error::NotRunning)?;

        if let Err(err) = bus.init().and_then(|()| bus.start()) {
            bus.cleanup();
            return Err(err);
        }
        let vram = bus.vram();
        let max = Extent2D::new(bus.max_width(), bus.max_height());
        let active = match ActiveModeSet::build(max) {
            Ok(active) => active,
            Err(err) => {
                bus.cleanup();
                return Err(err);
            }
        };
        let current = modes::detect_current_mode(
            bus.current_width(),
            bus.current_height(),
            ModeId(self.config.default_mode),
        );
        debug!(
            "virtio-fbd: max {}, current mode {}, {} active modes",
            max,
            current,
            active.len()
        );

        let display = Arc::new(SharedDisplay::new(DisplayState::new(bus, active, current)));
        let switch = ModeSwitch::new(
            Arc::clone(&display),
            Arc::clone(&self.notifier),
            &self.config,
        );

        let accel = AccelerationBackend::bring_up(BringUp {
            identity: self.identity,
            profile,
            transport: self.transport.clone(),
            config: &self.config,
            publisher: self.publisher.as_ref(),
        });

        Ok(Running {
            apertures: ApertureManager::new(Arc::clone(&display), vram),
            display,
            switch,
            accel: Mutex::new(accel),
        })
    }

    /// Blank the screen and release everything. Errors are logged, not returned.
    pub fn stop(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if !matches!(*lifecycle, LifecycleState::Running | LifecycleState::Failed) {
                return;
            }
            *lifecycle = LifecycleState::Stopping;
        }

        let running = self.running.lock().take();
        if let Some(running) = running {
            match running.apertures.clear_visible() {
                Ok(true) => thread::sleep(self.config.clear_settle),
                Ok(false) => {}
                Err(err) => warn!("virtio-fbd: could not clear framebuffer: {}", err),
            }
            running.accel.lock().teardown();
            running.display.lock().bus.cleanup();
            running.switch.shutdown();
        }
        if let Some(mut bus) = self.bus.lock().take() {
            bus.cleanup();
        }

        self.set_state(LifecycleState::Stopped);
        info!("virtio-fbd: stopped");
    }

    /// Custom-mode ioctl
    ///
    /// `input` and `output` each hold one [`CustomModeData`]. Without
    /// [`CustomModeData::SET`] only the current geometry is reported.
    pub fn custom_mode(&self, input: Option<&[u8]>, output: Option<&mut [u8]>) -> Result<CustomModeData> {
        let input = input
            .filter(|buf| buf.len() >= CustomModeData::SIZE)
            .ok_or(Error::BadArgument("custom mode input buffer"))?;
        let output = output
            .filter(|buf| buf.len() >= CustomModeData::SIZE)
            .ok_or(Error::BadArgument("custom mode output buffer"))?;
        let request: CustomModeData = bytemuck::pod_read_unaligned(&input[..CustomModeData::SIZE]);
        let running = self.running()?;

        let geometry = if request.flags & CustomModeData::SET != 0 {
            running.switch.request_custom_mode(request.width, request.height)?
        } else {
            let state = running.display.lock();
            modes::resolve_or_err(state.display_mode, &state.custom)?.extent()
        };

        let reply = CustomModeData {
            flags: request.flags,
            width: geometry.width,
            height: geometry.height,
        };
        output[..CustomModeData::SIZE].copy_from_slice(bytemuck::bytes_of(&reply));
        Ok(reply)
    }

    pub fn switch_step(&self) -> Result<SwitchStep> {
        Ok(self.running()?.display.step())
    }

    /// Only the custom mode is listed while a switch is in flight
    pub fn display_mode_count(&self) -> Result<usize> {
        let running = self.running()?;
        let state = running.display.lock();
        Ok(match state.step {
            SwitchStep::Idle => state.active.len(),
            _ => 1,
        })
    }

    pub fn display_modes(&self) -> Result<Vec<ModeId>> {
        let running = self.running()?;
        let state = running.display.lock();
        Ok(match state.step {
            SwitchStep::Idle => state.active.ids().to_vec(),
            _ => vec![ModeId::CUSTOM],
        })
    }

    /// Current mode and depth index
    pub fn current_display_mode(&self) -> Result<(ModeId, u32)> {
        Ok((self.running()?.display.lock().display_mode, 0))
    }

    pub fn set_display_mode(&self, id: ModeId, depth: u32) -> Result<()> {
        if depth != 0 {
            return Err(Error::BadArgument("depth index"));
        }
        let running = self.running()?;
        let mut state = running.display.lock();
        let entry = modes::resolve_or_err(id, &state.custom)?;

        if state.custom_mode_switched {
            if entry.same_geometry(&state.custom) {
                state.custom_mode_switched = false;
            } else {
                debug!("virtio-fbd: mode {} set without touching hardware", id);
            }
            state.display_mode = id;
            return Ok(());
        }

        state.bus.set_mode(entry.width, entry.height, 32)?;
        state.display_mode = id;
        debug!("virtio-fbd: display mode {} ({}x{})", id, entry.width, entry.height);
        Ok(())
    }

    pub fn set_attribute(&self, attribute: Attribute, value: u64) -> Result<()> {
        debug!("virtio-fbd: attribute {:?} = {:#x}", attribute, value);
        if attribute == Attribute::Captured && value == 0 {
            let running = self.running()?;
            if switch::acknowledge(&running.display) {
                debug!("virtio-fbd: custom mode acknowledged");
            }
        }
        Ok(())
    }

    /// VRAM is never saved and the display never blanks
    pub fn attribute(&self, attribute: Attribute) -> Result<u64> {
        match attribute {
            Attribute::VramSave | Attribute::Power => Ok(0),
            Attribute::Captured | Attribute::Other(_) => Err(Error::Unsupported),
        }
    }

    /// The single connection is always enabled and carries no flags.
    /// Sense and display-parameter queries are not supported.
    pub fn connection_attribute(&self, attribute: ConnectionAttribute) -> Result<u64> {
        let value = match attribute {
            ConnectionAttribute::Enable => 1,
            ConnectionAttribute::Flags | ConnectionAttribute::Changed => 0,
            ConnectionAttribute::SupportsAppleSense
            | ConnectionAttribute::SupportsLlddcSense
            | ConnectionAttribute::SupportsHlddcSense
            | ConnectionAttribute::DisplayParameterCount
            | ConnectionAttribute::DisplayParameters
            | ConnectionAttribute::Power
            | ConnectionAttribute::PostWake => return Err(Error::Unsupported),
        };
        debug!("virtio-fbd: connection {:?} = {}", attribute, value);
        Ok(value)
    }

    pub fn mode_information(&self, id: ModeId) -> Result<ModeInformation> {
        let running = self.running()?;
        let entry = {
            let state = running.display.lock();
            modes::resolve_or_err(id, &state.custom)?
        };
        Ok(ModeInformation {
            width: entry.width,
            height: entry.height,
            refresh_rate: REFRESH_RATE_60HZ,
            max_depth_index: 0,
            flags: entry.flags,
        })
    }

    pub fn pixel_information(
        &self,
        id: ModeId,
        depth: u32,
        aperture: Aperture,
    ) -> Result<PixelInformation> {
        if aperture != Aperture::System {
            return Err(Error::Unsupported);
        }
        if depth != 0 {
            return Err(Error::BadArgument("depth index"));
        }
        let running = self.running()?;
        let entry = {
            let state = running.display.lock();
            modes::resolve_or_err(id, &state.custom)?
        };
        Ok(PixelInformation {
            active_width: entry.width,
            active_height: entry.height,
            bytes_per_row: bytes_per_row(entry.width),
            bits_per_pixel: 32,
            component_count: 3,
            bits_per_component: 8,
            component_masks: [0xFF0000, 0x00FF00, 0x0000FF],
            pixel_format: PIXEL_FORMAT_32BPP,
            flags: entry.flags,
        })
    }

    pub fn pixel_formats(&self) -> &'static [&'static str] {
        &[PIXEL_FORMAT_32BPP]
    }

    pub fn connection_count(&self) -> u32 {
        1
    }

    pub fn vram_range(&self) -> Option<MemoryRange> {
        self.running().ok()?.apertures.vram_range()
    }

    pub fn aperture_range(&self, aperture: Aperture) -> Option<MemoryRange> {
        self.running().ok()?.apertures.aperture_range(aperture)
    }

    pub fn register_interrupt(
        &self,
        kind: InterruptType,
        callback: InterruptProc,
        context: usize,
    ) -> Result<InterruptRef> {
        self.notifier.register(kind, callback, context)
    }

    pub fn unregister_interrupt(&self, interrupt: InterruptRef) -> Result<()> {
        self.notifier.unregister(interrupt)
    }

    pub fn set_interrupt_state(&self, interrupt: InterruptRef, enabled: bool) -> Result<()> {
        self.notifier.set_interrupt_state(interrupt, enabled)
    }

    /// Notifications delivered to the registered client so far
    pub fn notifications(&self) -> u64 {
        self.notifier.delivered()
    }

    /// "real", "mock" or "disabled"; `None` unless running
    pub fn acceleration(&self) -> Option<String> {
        let running = self.running().ok()?;
        let accel = running.accel.lock();
        Some(accel.to_string())
    }

    /// Run `f` against the acceleration backend
    pub fn with_acceleration<R>(&self, f: impl FnOnce(&AccelerationBackend) -> R) -> Result<R> {
        let running = self.running()?;
        let accel = running.accel.lock();
        Ok(f(&accel))
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.stop();
    }
}
