// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Custom-resolution handshake
//!
//! ```text
//!   request_custom_mode          set_attribute(Captured)       restore worker
//!   Idle ──────────────► Requested ─────────────► Acknowledged ───────────► Idle
//!          notify                    wake waiter                   notify
//! ```
//!
//! A request blocks until the client has switched to the custom mode or
//! the acknowledgement timeout expires, in which case the step falls back
//! to Idle and the client is told to re-read the mode list.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gal::Extent2D;
use log::{debug, info, warn};

use crate::config::DriverConfig;
use crate::deferred::DeferredCall;
use crate::display::{DisplayState, SharedDisplay, SwitchStep};
use crate::error::{Error, Result};
use crate::modes::{self, ModeId};
use crate::notify::ConnectionNotifier;

pub struct ModeSwitch {
    display: Arc<SharedDisplay>,
    notifier: Arc<ConnectionNotifier>,
    restore: Option<DeferredCall>,
    ack_timeout: Duration,
    restore_delay: Duration,
    min: Extent2D,
}

impl ModeSwitch {
    /// Spawn the restore worker. Without it custom modes are unsupported.
    pub fn new(
        display: Arc<SharedDisplay>,
        notifier: Arc<ConnectionNotifier>,
        config: &DriverConfig,
    ) -> Self {
        let worker_display = Arc::clone(&display);
        let worker_notifier = Arc::clone(&notifier);
        let restore = match DeferredCall::spawn("virtio-fbd-restore", move || {
            restore_all_modes(&worker_display, &worker_notifier);
        }) {
            Ok(call) => Some(call),
            Err(err) => {
                warn!("virtio-fbd: no restore worker, custom modes disabled: {}", err);
                None
            }
        };
        Self::with_restore(display, notifier, config, restore)
    }

    pub fn with_restore(
        display: Arc<SharedDisplay>,
        notifier: Arc<ConnectionNotifier>,
        config: &DriverConfig,
        restore: Option<DeferredCall>,
    ) -> Self {
        Self {
            display,
            notifier,
            restore,
            ack_timeout: config.ack_timeout,
            restore_delay: config.restore_delay,
            min: config.min_custom,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.restore.is_some()
    }

    pub fn step(&self) -> SwitchStep {
        self.display.step()
    }

    /// Ask the client to switch to `width`x`height`
    ///
    /// The geometry is clamped to the supported range first. Returns the
    /// geometry of the current mode once the handshake completes.
    pub fn request_custom_mode(&self, width: u32, height: u32) -> Result<Extent2D> {
        let restore = self.restore.as_ref().ok_or(Error::Unsupported)?;

        let (previous_mode, previous_custom) = {
            let mut state = self.display.lock();
            let target = Extent2D::new(width, height).clamp(self.min, state.max_extent());
            let current = state
                .current_mode()
                .ok_or(Error::UnknownMode(state.display_mode.0))?;
            if current.extent() == target {
                debug!("virtio-fbd: custom {} already current", target);
                return Ok(target);
            }
            if state.step != SwitchStep::Idle {
                return Err(Error::Busy);
            }

            let previous = (state.display_mode, state.custom);
            state.custom.width = target.width;
            state.custom.height = target.height;
            self.display.set_step(&mut state, SwitchStep::Requested);
            info!("virtio-fbd: custom mode {} requested", target);
            previous
        };

        self.notifier.emit();

        let mut state = self.display.lock();
        let deadline = Instant::now() + self.ack_timeout;
        let acked = self
            .display
            .wait_step_until(&mut state, deadline, |step| step == SwitchStep::Acknowledged);
        if !acked {
            if state.step == SwitchStep::Requested {
                // the client may have switched without releasing capture
                if state.display_mode == ModeId::CUSTOM {
                    state.custom = previous_custom;
                    roll_back(&mut state, previous_mode);
                }
                self.display.set_step(&mut state, SwitchStep::Idle);
            }
            drop(state);
            warn!(
                "virtio-fbd: custom mode not acknowledged within {:?}",
                self.ack_timeout
            );
            self.notifier.emit();
            return Err(Error::Timeout);
        }

        let current = modes::resolve_or_err(state.display_mode, &state.custom)?;
        drop(state);
        restore.schedule(self.restore_delay);
        Ok(current.extent())
    }

    /// Stop the restore worker; a pending restore is dropped
    pub fn shutdown(&self) {
        if let Some(restore) = &self.restore {
            restore.shutdown();
        }
    }
}

/// Put the display back on `mode` after an abandoned switch
fn roll_back(state: &mut DisplayState, mode: ModeId) {
    let Some(entry) = modes::resolve(mode, &state.custom) else {
        return;
    };
    match state.bus.set_mode(entry.width, entry.height, 32) {
        Ok(()) => {
            state.display_mode = mode;
            state.custom_mode_switched = false;
            debug!("virtio-fbd: switch abandoned, back to mode {}", mode);
        }
        Err(err) => warn!("virtio-fbd: could not restore mode {}: {}", mode, err),
    }
}

/// Client confirmation that it is displaying the custom mode
///
/// Only counts while a request is outstanding and the client has already
/// selected the custom mode.
pub fn acknowledge(display: &SharedDisplay) -> bool {
    let mut state = display.lock();
    if state.step != SwitchStep::Requested || state.display_mode != ModeId::CUSTOM {
        return false;
    }
    display.set_step(&mut state, SwitchStep::Acknowledged);
    true
}

/// Put the full mode list back once the client has settled on the custom mode
///
/// The first active slot whose geometry differs from the custom one moves to
/// slot 0. Returns false and changes nothing when there is no such slot or
/// no acknowledged switch.
pub fn restore_all_modes(display: &SharedDisplay, notifier: &ConnectionNotifier) -> bool {
    {
        let mut state = display.lock();
        if state.step != SwitchStep::Acknowledged {
            return false;
        }
        let custom = state.custom;
        let slot = state.active.ids().iter().position(|&id| {
            modes::builtin(id).map_or(false, |entry| !entry.same_geometry(&custom))
        });
        let Some(slot) = slot else {
            return false;
        };

        state.active.swap(0, slot);
        state.custom_mode_switched = true;
        display.set_step(&mut state, SwitchStep::Idle);
        debug!("virtio-fbd: mode list restored, slot {} promoted", slot);
    }

    notifier.emit();
    true
}
