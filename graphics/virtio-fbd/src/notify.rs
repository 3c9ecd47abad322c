// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Connection-changed notification
//!
//! A single registration slot. Callbacks are invoked with no driver lock
//! held so the client may call straight back into the driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Interrupt kinds a client may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    /// Display configuration changed; the only kind this driver raises
    Connect,
    VerticalBlank,
    DisplayPort,
}

/// Handle returned by [`ConnectionNotifier::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterruptRef(u64);

/// Callback plus the opaque context it is called with
pub type InterruptProc = Arc<dyn Fn(usize) + Send + Sync>;

struct Registration {
    token: u64,
    callback: InterruptProc,
    context: usize,
}

#[derive(Default)]
struct Slot {
    registration: Option<Registration>,
    enabled: bool,
}

#[derive(Default)]
pub struct ConnectionNotifier {
    slot: Mutex<Slot>,
    next_token: AtomicU64,
    delivered: AtomicU64,
}

impl ConnectionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, replacing any previous registration, and enable delivery
    pub fn register(
        &self,
        kind: InterruptType,
        callback: InterruptProc,
        context: usize,
    ) -> Result<InterruptRef> {
        if kind != InterruptType::Connect {
            return Err(Error::Unsupported);
        }
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let mut slot = self.slot.lock();
        slot.registration = Some(Registration {
            token,
            callback,
            context,
        });
        slot.enabled = true;
        debug!("notify: connect interrupt registered ({})", token);
        Ok(InterruptRef(token))
    }

    pub fn set_interrupt_state(&self, interrupt: InterruptRef, enabled: bool) -> Result<()> {
        let mut slot = self.slot.lock();
        Self::check(&slot, interrupt)?;
        slot.enabled = enabled;
        Ok(())
    }

    pub fn unregister(&self, interrupt: InterruptRef) -> Result<()> {
        let mut slot = self.slot.lock();
        Self::check(&slot, interrupt)?;
        *slot = Slot::default();
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        let slot = self.slot.lock();
        slot.enabled && slot.registration.is_some()
    }

    /// Run the callback if one is registered and enabled; a no-op otherwise
    pub fn emit(&self) -> bool {
        let target = {
            let slot = self.slot.lock();
            match &slot.registration {
                Some(reg) if slot.enabled => Some((Arc::clone(&reg.callback), reg.context)),
                _ => None,
            }
        };
        match target {
            Some((callback, context)) => {
                self.delivered.fetch_add(1, Ordering::SeqCst);
                debug!("notify: connection changed");
                callback(context);
                true
            }
            None => false,
        }
    }

    /// Number of notifications delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    fn check(slot: &Slot, interrupt: InterruptRef) -> Result<()> {
        match &slot.registration {
            Some(reg) if reg.token == interrupt.0 => Ok(()),
            _ => Err(Error::BadArgument("stale interrupt reference")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, InterruptProc) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let proc_: InterruptProc = Arc::new(move |ctx| {
            assert_eq!(ctx, 42);
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, proc_)
    }

    #[test]
    fn test_emit_without_registration_is_noop() {
        let n = ConnectionNotifier::new();
        assert!(!n.emit());
        assert_eq!(n.delivered(), 0);
    }

    #[test]
    fn test_only_connect_kind_accepted() {
        let n = ConnectionNotifier::new();
        let (_, cb) = counter();
        assert_matches!(
            n.register(InterruptType::VerticalBlank, cb, 42),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn test_enable_disable_delivery() {
        let n = ConnectionNotifier::new();
        let (hits, cb) = counter();
        let r = n.register(InterruptType::Connect, cb, 42).unwrap();
        assert!(n.emit());
        n.set_interrupt_state(r, false).unwrap();
        assert!(!n.emit());
        n.set_interrupt_state(r, true).unwrap();
        assert!(n.emit());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_ref_rejected() {
        let n = ConnectionNotifier::new();
        let (_, cb) = counter();
        let old = n.register(InterruptType::Connect, cb.clone(), 42).unwrap();
        let new = n.register(InterruptType::Connect, cb, 42).unwrap();
        assert_matches!(n.set_interrupt_state(old, false), Err(Error::BadArgument(_)));
        assert_matches!(n.unregister(old), Err(Error::BadArgument(_)));
        n.unregister(new).unwrap();
        assert!(!n.is_enabled());
        assert_matches!(n.unregister(new), Err(Error::BadArgument(_)));
    }

    #[test]
    fn test_callback_may_reenter() {
        let n = Arc::new(ConnectionNotifier::new());
        let inner = Arc::clone(&n);
        let cb: InterruptProc = Arc::new(move |_| {
            // the slot lock must not be held here
            assert!(inner.is_enabled());
        });
        n.register(InterruptType::Connect, cb, 0).unwrap();
        assert!(n.emit());
    }
}
