// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Display mode registry
//!
//! Built-in modes live in a constant table addressed by ids `1..=N`. One
//! extra writable slot, the custom mode, sits behind [`ModeId::CUSTOM`]. The
//! table itself is never written at runtime; the custom slot is owned by the
//! driver's shared state and only the mode-switch code writes it.

use std::fmt;

use bitflags::bitflags;
use gal::Extent2D;

use crate::error::{Error, Result};

bitflags! {
    /// Per-mode flags reported to the host
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        const VALID = 1 << 0;
        const SAFE = 1 << 1;
        const DEFAULT = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayModeEntry {
    pub width: u32,
    pub height: u32,
    pub flags: ModeFlags,
}

impl DisplayModeEntry {
    pub const fn new(width: u32, height: u32, flags: ModeFlags) -> Self {
        Self {
            width,
            height,
            flags,
        }
    }

    pub const fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }

    pub fn same_geometry(&self, other: &DisplayModeEntry) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Mode identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeId(pub u32);

impl ModeId {
    /// Sentinel addressing the custom slot
    pub const CUSTOM: ModeId = ModeId(0x1000);

    pub fn is_custom(self) -> bool {
        self == ModeId::CUSTOM
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_custom() {
            write!(f, "custom")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

const V: ModeFlags = ModeFlags::VALID;
const VS: ModeFlags = ModeFlags::VALID.union(ModeFlags::SAFE);
const VSD: ModeFlags = VS.union(ModeFlags::DEFAULT);

/// Built-in modes, ordered by area
pub static BUILTIN_MODES: &[DisplayModeEntry] = &[
    DisplayModeEntry::new(800, 600, VS),
    DisplayModeEntry::new(1024, 768, VSD),
    DisplayModeEntry::new(1152, 864, VS),
    DisplayModeEntry::new(1280, 720, VS),
    DisplayModeEntry::new(1280, 768, V),
    DisplayModeEntry::new(1280, 800, VS),
    DisplayModeEntry::new(1280, 960, V),
    DisplayModeEntry::new(1280, 1024, VS),
    DisplayModeEntry::new(1360, 768, V),
    DisplayModeEntry::new(1366, 768, VS),
    DisplayModeEntry::new(1400, 1050, V),
    DisplayModeEntry::new(1440, 900, VS),
    DisplayModeEntry::new(1600, 900, VS),
    DisplayModeEntry::new(1600, 1200, V),
    DisplayModeEntry::new(1680, 1050, VS),
    DisplayModeEntry::new(1920, 1080, VS),
    DisplayModeEntry::new(1920, 1200, VS),
    DisplayModeEntry::new(1920, 1440, V),
    DisplayModeEntry::new(2048, 1152, V),
    DisplayModeEntry::new(2048, 1536, V),
    DisplayModeEntry::new(2304, 1440, V),
    DisplayModeEntry::new(2560, 1080, V),
    DisplayModeEntry::new(2560, 1440, VS),
    DisplayModeEntry::new(2560, 1600, V),
];

pub fn builtin_count() -> u32 {
    BUILTIN_MODES.len() as u32
}

/// Look up a built-in mode
pub fn builtin(id: ModeId) -> Option<&'static DisplayModeEntry> {
    if id.0 == 0 {
        return None;
    }
    BUILTIN_MODES.get(id.0 as usize - 1)
}

/// Resolve `id` against the table and the given custom slot
pub fn resolve(id: ModeId, custom: &DisplayModeEntry) -> Option<DisplayModeEntry> {
    if id.is_custom() {
        return Some(*custom);
    }
    builtin(id).copied()
}

/// Like [`resolve`], for callers that want an error
pub fn resolve_or_err(id: ModeId, custom: &DisplayModeEntry) -> Result<DisplayModeEntry> {
    resolve(id, custom).ok_or(Error::UnknownMode(id.0))
}

/// Pick the mode matching the device's current geometry
///
/// Falls back to the table entry flagged `DEFAULT`, then to `default`.
pub fn detect_current_mode(width: u32, height: u32, default: ModeId) -> ModeId {
    let mut table_default = None;
    for (index, entry) in BUILTIN_MODES.iter().enumerate() {
        let id = ModeId(index as u32 + 1);
        if entry.width == width && entry.height == height {
            return id;
        }
        if table_default.is_none() && entry.flags.contains(ModeFlags::DEFAULT) {
            table_default = Some(id);
        }
    }
    table_default.unwrap_or(default)
}

/// Built-in modes usable on the current device, in enumeration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveModeSet {
    ids: Vec<ModeId>,
}

impl ActiveModeSet {
    /// Keep the entries that fit `max`. Fewer than three is fatal.
    pub fn build(max: Extent2D) -> Result<Self> {
        let ids: Vec<ModeId> = BUILTIN_MODES
            .iter()
            .enumerate()
            .filter(|(_, m)| m.width <= max.width && m.height <= max.height)
            .map(|(i, _)| ModeId(i as u32 + 1))
            .collect();
        if ids.len() <= 2 {
            return Err(Error::InsufficientModes { count: ids.len() });
        }
        Ok(Self { ids })
    }

    pub fn ids(&self) -> &[ModeId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ModeId) -> bool {
        self.ids.contains(&id)
    }

    /// Swap two slots. Membership never changes.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.ids.swap(a, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_table_fits_dispi_limits() {
        assert!(BUILTIN_MODES.len() > 2);
        for m in BUILTIN_MODES {
            assert!(m.width <= 2560 && m.height <= 1600);
            assert!(m.flags.contains(ModeFlags::VALID));
        }
        let defaults = BUILTIN_MODES
            .iter()
            .filter(|m| m.flags.contains(ModeFlags::DEFAULT))
            .count();
        assert_eq!(defaults, 1);
    }

    #[test]
    fn test_resolve() {
        let custom = DisplayModeEntry::new(1234, 777, ModeFlags::VALID);
        assert_eq!(resolve(ModeId(1), &custom), Some(BUILTIN_MODES[0]));
        assert_eq!(resolve(ModeId::CUSTOM, &custom), Some(custom));
        assert_eq!(resolve(ModeId(0), &custom), None);
        assert_eq!(resolve(ModeId(builtin_count() + 1), &custom), None);
        assert_matches!(
            resolve_or_err(ModeId(999), &custom),
            Err(Error::UnknownMode(999))
        );
    }

    #[test]
    fn test_detect_exact_match() {
        assert_eq!(detect_current_mode(1920, 1080, ModeId(3)), ModeId(16));
        // entry 0 is searched too
        assert_eq!(detect_current_mode(800, 600, ModeId(3)), ModeId(1));
    }

    #[test]
    fn test_detect_falls_back_to_table_default() {
        assert_eq!(detect_current_mode(640, 480, ModeId(3)), ModeId(2));
    }

    #[test]
    fn test_active_set_filters_by_max() {
        let set = ActiveModeSet::build(Extent2D::new(1280, 800)).unwrap();
        let expected: Vec<ModeId> = [1, 2, 4, 5, 6].iter().map(|&i| ModeId(i)).collect();
        assert_eq!(set.ids(), expected.as_slice());
    }

    #[test]
    fn test_active_set_needs_three_modes() {
        assert_matches!(
            ActiveModeSet::build(Extent2D::new(1024, 768)),
            Err(Error::InsufficientModes { count: 2 })
        );
        assert_matches!(
            ActiveModeSet::build(Extent2D::new(640, 480)),
            Err(Error::InsufficientModes { count: 0 })
        );
    }
}
