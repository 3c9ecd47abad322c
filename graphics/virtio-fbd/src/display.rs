// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! State shared between entry points and the restore worker
//!
//! Everything that describes what is on screen sits behind one lock: the
//! bus itself, the custom slot, the switch step, the active-set order, the
//! current mode and the live flag. The lock is never held while a
//! notification is delivered.

use std::time::Instant;

use gal::Extent2D;
use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::bus::DisplayBus;
use crate::modes::{self, ActiveModeSet, DisplayModeEntry, ModeId};

/// Custom-mode handshake step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SwitchStep {
    Idle = 0,
    /// Custom geometry written, waiting for the client
    Requested = 1,
    /// Client switched to the custom mode, restore pending
    Acknowledged = 2,
}

pub struct DisplayState {
    pub bus: Box<dyn DisplayBus>,
    pub custom: DisplayModeEntry,
    pub active: ActiveModeSet,
    pub step: SwitchStep,
    pub display_mode: ModeId,
    /// The custom geometry is on screen; mode sets skip the hardware
    pub custom_mode_switched: bool,
}

impl DisplayState {
    pub fn new(bus: Box<dyn DisplayBus>, active: ActiveModeSet, display_mode: ModeId) -> Self {
        Self {
            bus,
            custom: modes::BUILTIN_MODES[0],
            active,
            step: SwitchStep::Idle,
            display_mode,
            custom_mode_switched: false,
        }
    }

    /// Entry behind the current display mode id
    pub fn current_mode(&self) -> Option<DisplayModeEntry> {
        modes::resolve(self.display_mode, &self.custom)
    }

    /// Largest geometry a custom request may ask for
    pub fn max_extent(&self) -> Extent2D {
        Extent2D::new(self.bus.max_width(), self.bus.max_height())
    }
}

pub struct SharedDisplay {
    state: Mutex<DisplayState>,
    step_changed: Condvar,
}

impl SharedDisplay {
    pub fn new(state: DisplayState) -> Self {
        Self {
            state: Mutex::new(state),
            step_changed: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, DisplayState> {
        self.state.lock()
    }

    pub fn step(&self) -> SwitchStep {
        self.state.lock().step
    }

    /// Move to `step` and wake every waiter. Caller holds the lock.
    pub fn set_step(&self, state: &mut DisplayState, step: SwitchStep) {
        debug!("virtio-fbd: switch {:?} -> {:?}", state.step, step);
        state.step = step;
        self.step_changed.notify_all();
    }

    /// Block until `done` holds or `deadline` passes
    ///
    /// The predicate is re-evaluated after every wakeup. Returns whether it
    /// held.
    pub fn wait_step_until<F>(
        &self,
        state: &mut MutexGuard<'_, DisplayState>,
        deadline: Instant,
        done: F,
    ) -> bool
    where
        F: Fn(SwitchStep) -> bool,
    {
        while !done(state.step) {
            if self.step_changed.wait_until(state, deadline).timed_out() {
                return done(state.step);
            }
        }
        true
    }
}
