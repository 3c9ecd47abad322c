// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Memory ranges handed out for VRAM and apertures

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Backing storage for video memory
pub trait MemoryRegion: Send + Sync {
    /// Bus address of byte 0
    fn base(&self) -> u64;

    fn len(&self) -> u64;

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Set `len` bytes starting at `offset` to `value`
    fn fill(&self, offset: u64, len: u64, value: u8) -> Result<()>;
}

/// Host-memory region used by simulated buses
pub struct HeapMemory {
    base: u64,
    bytes: RwLock<Box<[u8]>>,
}

impl HeapMemory {
    pub fn new(base: u64, len: usize) -> Self {
        Self {
            base,
            bytes: RwLock::new(vec![0u8; len].into_boxed_slice()),
        }
    }

    fn span(&self, offset: u64, len: u64) -> Result<std::ops::Range<usize>> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.len())
            .ok_or(Error::BadArgument("access outside memory region"))?;
        Ok(offset as usize..end as usize)
    }
}

impl MemoryRegion for HeapMemory {
    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> u64 {
        self.bytes.read().len() as u64
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let span = self.span(offset, buf.len() as u64)?;
        buf.copy_from_slice(&self.bytes.read()[span]);
        Ok(())
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let span = self.span(offset, data.len() as u64)?;
        self.bytes.write()[span].copy_from_slice(data);
        Ok(())
    }

    fn fill(&self, offset: u64, len: u64, value: u8) -> Result<()> {
        let span = self.span(offset, len)?;
        self.bytes.write()[span].fill(value);
        Ok(())
    }
}

/// A window onto a [`MemoryRegion`]
#[derive(Clone)]
pub struct MemoryRange {
    region: Arc<dyn MemoryRegion>,
    offset: u64,
    len: u64,
}

impl MemoryRange {
    /// The whole region
    pub fn new(region: Arc<dyn MemoryRegion>) -> Self {
        let len = region.len();
        Self {
            region,
            offset: 0,
            len,
        }
    }

    /// Bus address of the first byte of this range
    pub fn address(&self) -> u64 {
        self.region.base() + self.offset
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `None` unless `[offset, offset + len)` lies inside this range
    pub fn sub_range(&self, offset: u64, len: u64) -> Option<MemoryRange> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(MemoryRange {
            region: Arc::clone(&self.region),
            offset: self.offset + offset,
            len,
        })
    }

    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check(offset, buf.len() as u64)?;
        self.region.read(self.offset + offset, buf)
    }

    pub fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.check(offset, data.len() as u64)?;
        self.region.write(self.offset + offset, data)
    }

    pub fn fill(&self, offset: u64, len: u64, value: u8) -> Result<()> {
        self.check(offset, len)?;
        self.region.fill(self.offset + offset, len, value)
    }

    fn check(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::BadArgument("access outside memory range")),
        }
    }
}

impl fmt::Debug for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRange")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn range(len: usize) -> MemoryRange {
        MemoryRange::new(Arc::new(HeapMemory::new(0xE000_0000, len)))
    }

    #[test]
    fn test_sub_range_bounds() {
        let r = range(4096);
        let sub = r.sub_range(1024, 1024).unwrap();
        assert_eq!(sub.address(), 0xE000_0400);
        assert_eq!(sub.len(), 1024);
        assert!(r.sub_range(4000, 200).is_none());
        assert!(r.sub_range(u64::MAX, 2).is_none());
        // nested windows stay relative to their parent
        assert_eq!(sub.sub_range(16, 16).unwrap().offset(), 1040);
    }

    #[test]
    fn test_write_through_window() {
        let r = range(64);
        let sub = r.sub_range(8, 8).unwrap();
        sub.write_bytes(0, &[0xAA; 8]).unwrap();
        let mut buf = [0u8; 16];
        r.read_bytes(0, &mut buf).unwrap();
        assert_eq!(&buf[..8], &[0u8; 8]);
        assert_eq!(&buf[8..], &[0xAA; 8]);
        assert_matches!(sub.write_bytes(4, &[0; 8]), Err(Error::BadArgument(_)));
    }

    #[test]
    fn test_fill() {
        let r = range(32);
        r.fill(0, 32, 0x7F).unwrap();
        r.fill(4, 4, 0).unwrap();
        let mut buf = [0u8; 8];
        r.read_bytes(0, &mut buf).unwrap();
        assert_eq!(buf, [0x7F, 0x7F, 0x7F, 0x7F, 0, 0, 0, 0]);
    }
}
