//! Accelerator lifecycle
//!
//! An accelerator is the 3D command subsystem stacked on top of a
//! [`Device`]. The display driver only needs its lifecycle and a capability
//! summary; everything else is the accelerator's own business.

use alloc::sync::Arc;

use crate::{Device, DeviceCapabilities, Error, Result};

/// Lifecycle state of an accelerator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelState {
    Created,
    Initialized,
    Attached,
    Running,
    Stopped,
}

impl AccelState {
    /// Check that a lifecycle step may run from this state
    pub fn expect(self, allowed: &[AccelState]) -> Result<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            log::debug!("gal: accelerator step rejected in state {:?}", self);
            Err(Error::NotInitialized)
        }
    }
}

/// 3D accelerator attached to a GPU device
pub trait Accelerator: Send {
    /// Current lifecycle state
    fn state(&self) -> AccelState;

    /// Allocate accelerator-side resources
    fn init(&mut self) -> Result<()>;

    /// Bind to a device. The accelerator keeps the handle until `detach`.
    fn attach(&mut self, device: Arc<dyn Device>) -> Result<()>;

    /// Begin accepting work
    fn start(&mut self) -> Result<()>;

    /// Stop accepting work; must not fail
    fn stop(&mut self);

    /// Release the device handle; must not fail
    fn detach(&mut self);

    /// Capabilities exposed through this accelerator
    fn capabilities(&self) -> DeviceCapabilities;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_state() {
        assert!(AccelState::Initialized
            .expect(&[AccelState::Initialized])
            .is_ok());
        assert_eq!(
            AccelState::Created.expect(&[AccelState::Attached]),
            Err(Error::NotInitialized)
        );
    }
}
