// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! PCI identification registers

use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Config-space offsets of the identification registers
const VENDOR_ID: usize = 0x00;
const DEVICE_ID: usize = 0x02;
const SUBSYSTEM_VENDOR_ID: usize = 0x2C;
const SUBSYSTEM_ID: usize = 0x2E;

/// The four ids the classifier keys on. Immutable once read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub device_id: u16,
    pub subsystem_vendor_id: u16,
    pub subsystem_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, device_id: u16) -> Self {
        Self {
            vendor_id,
            device_id,
            subsystem_vendor_id: 0,
            subsystem_id: 0,
        }
    }

    pub const fn with_subsystem(mut self, subsystem_vendor_id: u16, subsystem_id: u16) -> Self {
        self.subsystem_vendor_id = subsystem_vendor_id;
        self.subsystem_id = subsystem_id;
        self
    }

    /// Parse the identity out of a type-0 configuration header
    pub fn from_config_space(config: &[u8]) -> Result<Self> {
        if config.len() < SUBSYSTEM_ID + 2 {
            return Err(Error::BadArgument("config space shorter than 48 bytes"));
        }
        let read16 = |off: usize| u16::from_le_bytes([config[off], config[off + 1]]);

        let vendor_id = read16(VENDOR_ID);
        let device_id = read16(DEVICE_ID);
        if vendor_id == 0xffff && device_id == 0xffff {
            return Err(Error::Device(gal::Error::DeviceNotFound));
        }

        Ok(Self {
            vendor_id,
            device_id,
            subsystem_vendor_id: read16(SUBSYSTEM_VENDOR_ID),
            subsystem_id: read16(SUBSYSTEM_ID),
        })
    }

    /// Read the identity from a Linux sysfs device directory
    pub fn from_sysfs(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<u16> {
            let raw = fs::read_to_string(dir.join(name))?;
            parse_hex_u16(raw.trim())
        };
        Ok(Self {
            vendor_id: read("vendor")?,
            device_id: read("device")?,
            subsystem_vendor_id: read("subsystem_vendor")?,
            subsystem_id: read("subsystem_device")?,
        })
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} (subsys {:04x}:{:04x})",
            self.vendor_id, self.device_id, self.subsystem_vendor_id, self.subsystem_id
        )
    }
}

/// Parse `0x1af4`, `1AF4` or `1af4` into a 16-bit id
pub fn parse_hex_u16(s: &str) -> Result<u16> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| Error::Parse(format!("{:?}: {}", s, e)))
}
