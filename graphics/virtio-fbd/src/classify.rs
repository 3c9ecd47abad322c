// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Device classification
//!
//! Maps PCI identification registers to a [`DeviceProfile`]. The mapping is
//! a pair of ordered rule tables evaluated first-match:
//!
//! - `PRIMARY_RULES` keys on vendor/device. Exact ids of a vendor are listed
//!   before that vendor's allocated ranges, so an exact hit always wins.
//! - `DDA_RULES` keys on subsystem vendor/subsystem. Passthrough devices
//!   inherit the physical card's primary ids, so these rules are checked
//!   independently. A hit always marks the profile as passthrough but only
//!   supplies family and hints when no primary rule matched.
//!
//! Classification is pure and total; `Unknown` is a normal answer.

use std::fmt;

use bitflags::bitflags;

use crate::pci::DeviceIdentity;

pub const VENDOR_REDHAT_VIRTIO: u16 = 0x1AF4;
pub const VENDOR_REDHAT_QXL: u16 = 0x1B36;
pub const VENDOR_QEMU: u16 = 0x1234;
pub const VENDOR_VMWARE: u16 = 0x15AD;
pub const VENDOR_INTEL: u16 = 0x8086;
pub const VENDOR_AMD: u16 = 0x1002;
pub const VENDOR_NVIDIA: u16 = 0x10DE;
pub const VENDOR_MICROSOFT: u16 = 0x1414;

pub const DEVICE_QXL: u16 = 0x0100;

/// Probe priorities reported to the bus matcher
pub const PROBE_SCORE_VIRTIO: u32 = 95000;
pub const PROBE_SCORE_QXL: u32 = 90000;
pub const PROBE_SCORE_OTHER: u32 = 60000;

bitflags! {
    /// What the identity suggests the device can do
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Hints: u32 {
        const SUPPORTS_3D = 1 << 0;
        const VIRGL = 1 << 1;
        const RESOURCE_BLOB = 1 << 2;
        const MULTI_DISPLAY = 1 << 3;
        const HDR = 1 << 4;
        const VIDEO_CODEC = 1 << 5;
        const COMPUTE = 1 << 6;
        const RAY_TRACING = 1 << 7;
        const NEURAL = 1 << 8;
        const VRR = 1 << 9;
        const SR_IOV = 1 << 10;
        const SECURE = 1 << 11;
        const POWER_MGMT = 1 << 12;
        const DEBUG = 1 << 13;
        const EXPERIMENTAL = 1 << 14;
        const LEGACY = 1 << 15;
        const REMOTE_FX = 1 << 16;
        const CONTAINER = 1 << 17;
        const NESTED = 1 << 18;
        /// Matched by range rather than an exact id
        const EXTENDED_SUPPORT = 1 << 19;
    }
}

/// Specialisation of an extended VirtIO GPU id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedFeature {
    EnhancedMemory,
    MultiDisplay,
    Hdr,
    VideoCodec,
    Compute,
    RayTracing,
    NeuralProcessing,
    AdvancedDisplay,
    Virtualization,
    Security,
    PowerManagement,
    Debug,
    Experimental,
    Legacy,
    HyperVDda,
    RemoteFx,
    EnhancedSession,
    Container,
    Nested,
    /// Inside the VirtIO GPU block but not yet assigned
    Future,
}

impl ExtendedFeature {
    fn label(self) -> &'static str {
        match self {
            ExtendedFeature::EnhancedMemory => "Enhanced Memory",
            ExtendedFeature::MultiDisplay => "Multi-Display",
            ExtendedFeature::Hdr => "HDR",
            ExtendedFeature::VideoCodec => "Video Codec",
            ExtendedFeature::Compute => "Compute",
            ExtendedFeature::RayTracing => "Ray Tracing",
            ExtendedFeature::NeuralProcessing => "Neural Processing",
            ExtendedFeature::AdvancedDisplay => "Advanced Display",
            ExtendedFeature::Virtualization => "Virtualization",
            ExtendedFeature::Security => "Security",
            ExtendedFeature::PowerManagement => "Power Management",
            ExtendedFeature::Debug => "Debug",
            ExtendedFeature::Experimental => "Experimental",
            ExtendedFeature::Legacy => "Legacy",
            ExtendedFeature::HyperVDda => "Hyper-V DDA",
            ExtendedFeature::RemoteFx => "RemoteFX",
            ExtendedFeature::EnhancedSession => "Enhanced Session",
            ExtendedFeature::Container => "Container",
            ExtendedFeature::Nested => "Nested Virtualization",
            ExtendedFeature::Future => "Extended",
        }
    }
}

/// Device family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    VirtioGpuStandard,
    VirtioGpu3D,
    VirtioGpuExtended(ExtendedFeature),
    QemuVariant,
    Qxl,
    VMwareSVGA,
    IntelVirtualized,
    AMDVirtualized,
    NVIDIAVirtualized,
    HyperVSynthetic,
    HyperVDDA,
    Unknown,
}

/// Result of classifying a [`DeviceIdentity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub recognized: bool,
    pub family: DeviceFamily,
    pub hints: Hints,
    /// Subsystem ids identify a passthrough (DDA) assignment
    pub dda_passthrough: bool,
}

impl DeviceProfile {
    pub const UNKNOWN: DeviceProfile = DeviceProfile {
        recognized: false,
        family: DeviceFamily::Unknown,
        hints: Hints::empty(),
        dda_passthrough: false,
    };

    pub fn supports_3d(&self) -> bool {
        self.hints.contains(Hints::SUPPORTS_3D)
    }

    /// Whether the VirtIO GPU backend can drive this device
    pub fn is_virtio_gpu(&self) -> bool {
        matches!(
            self.family,
            DeviceFamily::VirtioGpuStandard
                | DeviceFamily::VirtioGpu3D
                | DeviceFamily::VirtioGpuExtended(_)
        )
    }

    pub fn model_name(&self) -> String {
        match self.family {
            DeviceFamily::VirtioGpuStandard => "VirtIO GPU".into(),
            DeviceFamily::VirtioGpu3D => "VirtIO GPU 3D (Virgl)".into(),
            DeviceFamily::VirtioGpuExtended(feature) => format!("VirtIO GPU ({})", feature.label()),
            DeviceFamily::QemuVariant => "QEMU VGA Compatible".into(),
            DeviceFamily::Qxl => "QXL Paravirtual Graphics".into(),
            DeviceFamily::VMwareSVGA => "VMware SVGA II".into(),
            DeviceFamily::IntelVirtualized => "Intel GVT-g Virtual GPU".into(),
            DeviceFamily::AMDVirtualized => "AMD MxGPU Virtual Function".into(),
            DeviceFamily::NVIDIAVirtualized => "NVIDIA vGPU".into(),
            DeviceFamily::HyperVSynthetic => "Microsoft Hyper-V Synthetic Video".into(),
            DeviceFamily::HyperVDDA => "Hyper-V DDA Passthrough GPU".into(),
            DeviceFamily::Unknown => "Unknown Display Adapter".into(),
        }
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.model_name(), self.hints)?;
        if self.dda_passthrough {
            write!(f, " [DDA]")?;
        }
        Ok(())
    }
}

/// Inclusive id range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub start: u16,
    pub end: u16,
}

impl IdRange {
    pub const ANY: IdRange = IdRange::span(0x0000, 0xFFFF);

    pub const fn exact(id: u16) -> Self {
        Self { start: id, end: id }
    }

    pub const fn span(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub const fn contains(&self, id: u16) -> bool {
        self.start <= id && id <= self.end
    }
}

struct Rule {
    vendor: IdRange,
    device: IdRange,
    subsystem_vendor: IdRange,
    subsystem: IdRange,
    family: DeviceFamily,
    hints: Hints,
}

impl Rule {
    fn matches(&self, id: &DeviceIdentity) -> bool {
        self.vendor.contains(id.vendor_id)
            && self.device.contains(id.device_id)
            && self.subsystem_vendor.contains(id.subsystem_vendor_id)
            && self.subsystem.contains(id.subsystem_id)
    }
}

const fn exact(vendor: u16, device: u16, family: DeviceFamily, hints: Hints) -> Rule {
    Rule {
        vendor: IdRange::exact(vendor),
        device: IdRange::exact(device),
        subsystem_vendor: IdRange::ANY,
        subsystem: IdRange::ANY,
        family,
        hints,
    }
}

const fn range(vendor: u16, start: u16, end: u16, family: DeviceFamily, hints: Hints) -> Rule {
    Rule {
        vendor: IdRange::exact(vendor),
        device: IdRange::span(start, end),
        subsystem_vendor: IdRange::ANY,
        subsystem: IdRange::ANY,
        family,
        hints: hints.union(Hints::EXTENDED_SUPPORT),
    }
}

const fn dda(start: u16, end: u16, hints: Hints) -> Rule {
    Rule {
        vendor: IdRange::ANY,
        device: IdRange::ANY,
        subsystem_vendor: IdRange::exact(VENDOR_MICROSOFT),
        subsystem: IdRange::span(start, end),
        family: DeviceFamily::HyperVDDA,
        hints,
    }
}

const fn ext(device: u16, feature: ExtendedFeature, extra: Hints) -> Rule {
    exact(
        VENDOR_REDHAT_VIRTIO,
        device,
        DeviceFamily::VirtioGpuExtended(feature),
        Hints::SUPPORTS_3D.union(extra),
    )
}

const NONE: Hints = Hints::empty();
const HW_3D: Hints = Hints::SUPPORTS_3D;

use DeviceFamily as F;
use ExtendedFeature as X;

static PRIMARY_RULES: &[Rule] = &[
    // VirtIO GPU block
    exact(VENDOR_REDHAT_VIRTIO, 0x1050, F::VirtioGpuStandard, NONE),
    exact(VENDOR_REDHAT_VIRTIO, 0x1051, F::VirtioGpu3D, HW_3D.union(Hints::VIRGL)),
    ext(0x1052, X::EnhancedMemory, Hints::RESOURCE_BLOB),
    ext(0x1053, X::MultiDisplay, Hints::MULTI_DISPLAY),
    ext(0x1054, X::Hdr, Hints::HDR),
    ext(0x1055, X::VideoCodec, Hints::VIDEO_CODEC),
    ext(0x1056, X::Compute, Hints::COMPUTE),
    ext(0x1057, X::RayTracing, Hints::RAY_TRACING),
    ext(0x1058, X::NeuralProcessing, Hints::NEURAL),
    ext(0x1059, X::AdvancedDisplay, Hints::VRR),
    ext(0x105A, X::Virtualization, Hints::SR_IOV),
    ext(0x105B, X::Security, Hints::SECURE),
    ext(0x105C, X::PowerManagement, Hints::POWER_MGMT),
    ext(0x105D, X::Debug, Hints::DEBUG),
    ext(0x105E, X::Experimental, Hints::EXPERIMENTAL),
    ext(0x105F, X::Legacy, Hints::LEGACY),
    ext(0x1060, X::HyperVDda, NONE),
    ext(0x1061, X::RemoteFx, Hints::REMOTE_FX),
    ext(0x1062, X::EnhancedSession, NONE),
    ext(0x1063, X::Container, Hints::CONTAINER),
    ext(0x1064, X::Nested, Hints::NESTED),
    range(VENDOR_REDHAT_VIRTIO, 0x1050, 0x10FF, F::VirtioGpuExtended(X::Future), HW_3D),
    // QXL
    exact(VENDOR_REDHAT_QXL, DEVICE_QXL, F::Qxl, NONE),
    // QEMU
    exact(VENDOR_QEMU, 0x1111, F::QemuVariant, NONE),
    exact(VENDOR_QEMU, 0x1001, F::QemuVariant, NONE),
    exact(VENDOR_QEMU, 0x0001, F::QemuVariant, NONE),
    exact(VENDOR_QEMU, 0x4000, F::QemuVariant, NONE),
    exact(VENDOR_QEMU, 0x0100, F::QemuVariant, NONE),
    exact(VENDOR_QEMU, 0x0002, F::QemuVariant, NONE),
    exact(VENDOR_QEMU, 0x1234, F::QemuVariant, NONE),
    range(VENDOR_QEMU, 0x0001, 0x00FF, F::QemuVariant, NONE),
    range(VENDOR_QEMU, 0x1000, 0x1FFF, F::QemuVariant, NONE),
    range(VENDOR_QEMU, 0x4000, 0x4FFF, F::QemuVariant, NONE),
    // VMware
    exact(VENDOR_VMWARE, 0x0405, F::VMwareSVGA, NONE),
    exact(VENDOR_VMWARE, 0x0710, F::VMwareSVGA, NONE),
    exact(VENDOR_VMWARE, 0x0801, F::VMwareSVGA, NONE),
    exact(VENDOR_VMWARE, 0x0720, F::VMwareSVGA, NONE),
    range(VENDOR_VMWARE, 0x0400, 0x04FF, F::VMwareSVGA, NONE),
    range(VENDOR_VMWARE, 0x0700, 0x07FF, F::VMwareSVGA, NONE),
    range(VENDOR_VMWARE, 0x0800, 0x08FF, F::VMwareSVGA, NONE),
    // Intel GVT-g / SR-IOV
    exact(VENDOR_INTEL, 0x5A85, F::IntelVirtualized, HW_3D),
    exact(VENDOR_INTEL, 0x3E92, F::IntelVirtualized, HW_3D),
    exact(VENDOR_INTEL, 0x9BC4, F::IntelVirtualized, HW_3D),
    exact(VENDOR_INTEL, 0x4680, F::IntelVirtualized, HW_3D),
    exact(VENDOR_INTEL, 0x56A0, F::IntelVirtualized, HW_3D),
    range(VENDOR_INTEL, 0x5A80, 0x5AFF, F::IntelVirtualized, HW_3D),
    range(VENDOR_INTEL, 0x3E90, 0x3EFF, F::IntelVirtualized, HW_3D),
    range(VENDOR_INTEL, 0x9BC0, 0x9BFF, F::IntelVirtualized, HW_3D),
    range(VENDOR_INTEL, 0x4680, 0x46FF, F::IntelVirtualized, HW_3D),
    range(VENDOR_INTEL, 0x56A0, 0x56FF, F::IntelVirtualized, HW_3D),
    // AMD MxGPU
    exact(VENDOR_AMD, 0x15DD, F::AMDVirtualized, HW_3D),
    exact(VENDOR_AMD, 0x7340, F::AMDVirtualized, HW_3D),
    exact(VENDOR_AMD, 0x164C, F::AMDVirtualized, HW_3D),
    range(VENDOR_AMD, 0x15D0, 0x15FF, F::AMDVirtualized, HW_3D),
    range(VENDOR_AMD, 0x7340, 0x73FF, F::AMDVirtualized, HW_3D),
    range(VENDOR_AMD, 0x1640, 0x16FF, F::AMDVirtualized, HW_3D),
    // NVIDIA vGPU
    exact(VENDOR_NVIDIA, 0x1B38, F::NVIDIAVirtualized, HW_3D),
    exact(VENDOR_NVIDIA, 0x20B0, F::NVIDIAVirtualized, HW_3D),
    exact(VENDOR_NVIDIA, 0x2204, F::NVIDIAVirtualized, HW_3D),
    range(VENDOR_NVIDIA, 0x1B30, 0x1BFF, F::NVIDIAVirtualized, HW_3D),
    range(VENDOR_NVIDIA, 0x20B0, 0x20FF, F::NVIDIAVirtualized, HW_3D),
    range(VENDOR_NVIDIA, 0x2200, 0x22FF, F::NVIDIAVirtualized, HW_3D),
    // Hyper-V synthetic video
    exact(VENDOR_MICROSOFT, 0x5353, F::HyperVSynthetic, NONE),
    exact(VENDOR_MICROSOFT, 0x5354, F::HyperVSynthetic, NONE),
    exact(VENDOR_MICROSOFT, 0x5355, F::HyperVSynthetic, NONE),
    exact(VENDOR_MICROSOFT, 0x5356, F::HyperVSynthetic, NONE),
    exact(VENDOR_MICROSOFT, 0x5357, F::HyperVSynthetic, NONE),
    exact(VENDOR_MICROSOFT, 0x5358, F::HyperVSynthetic, NONE),
    range(VENDOR_MICROSOFT, 0x5350, 0x535F, F::HyperVSynthetic, NONE),
];

static DDA_RULES: &[Rule] = &[
    dda(0xDDA0, 0xDDA0, NONE),
    dda(0xDDA1, 0xDDA1, Hints::RESOURCE_BLOB),
    dda(0xDDA2, 0xDDA2, Hints::SUPPORTS_3D),
    dda(0xDDA3, 0xDDA3, Hints::COMPUTE),
    dda(0xDDA0, 0xDDAF, NONE),
];

fn first_match(rules: &'static [Rule], id: &DeviceIdentity) -> Option<&'static Rule> {
    rules.iter().find(|rule| rule.matches(id))
}

/// Classify a device by its identification registers
pub fn classify(id: DeviceIdentity) -> DeviceProfile {
    let primary = first_match(PRIMARY_RULES, &id);
    let passthrough = first_match(DDA_RULES, &id);

    match (primary, passthrough) {
        (Some(rule), dda) => DeviceProfile {
            recognized: true,
            family: rule.family,
            hints: rule.hints,
            dda_passthrough: dda.is_some(),
        },
        (None, Some(rule)) => DeviceProfile {
            recognized: true,
            family: rule.family,
            hints: rule.hints,
            dda_passthrough: true,
        },
        (None, None) => DeviceProfile::UNKNOWN,
    }
}

/// Probe priority for a device, `None` if the driver should not bind
pub fn probe_score(id: DeviceIdentity) -> Option<u32> {
    if id.vendor_id == VENDOR_REDHAT_VIRTIO && IdRange::span(0x1050, 0x105F).contains(id.device_id)
    {
        return Some(PROBE_SCORE_VIRTIO);
    }
    let profile = classify(id);
    match profile.family {
        DeviceFamily::Qxl => Some(PROBE_SCORE_QXL),
        _ if profile.recognized => Some(PROBE_SCORE_OTHER),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn family(vendor: u16, device: u16) -> DeviceFamily {
        classify(DeviceIdentity::new(vendor, device)).family
    }

    #[test]
    fn test_virtio_standard_is_2d() {
        let p = classify(DeviceIdentity::new(0x1AF4, 0x1050));
        assert_eq!(p.family, DeviceFamily::VirtioGpuStandard);
        assert!(p.recognized);
        assert!(!p.supports_3d());
        assert!(p.is_virtio_gpu());
    }

    #[test]
    fn test_virtio_3d_has_virgl() {
        let p = classify(DeviceIdentity::new(0x1AF4, 0x1051));
        assert_eq!(p.family, DeviceFamily::VirtioGpu3D);
        assert!(p.supports_3d());
        assert!(p.hints.contains(Hints::VIRGL));
    }

    #[test]
    fn test_virtio_extended_table() {
        let expected = [
            (0x1052, X::EnhancedMemory, Hints::RESOURCE_BLOB),
            (0x1053, X::MultiDisplay, Hints::MULTI_DISPLAY),
            (0x1054, X::Hdr, Hints::HDR),
            (0x1055, X::VideoCodec, Hints::VIDEO_CODEC),
            (0x1056, X::Compute, Hints::COMPUTE),
            (0x1057, X::RayTracing, Hints::RAY_TRACING),
            (0x1058, X::NeuralProcessing, Hints::NEURAL),
            (0x1059, X::AdvancedDisplay, Hints::VRR),
            (0x105A, X::Virtualization, Hints::SR_IOV),
            (0x105B, X::Security, Hints::SECURE),
            (0x105C, X::PowerManagement, Hints::POWER_MGMT),
            (0x105D, X::Debug, Hints::DEBUG),
            (0x105E, X::Experimental, Hints::EXPERIMENTAL),
            (0x105F, X::Legacy, Hints::LEGACY),
            (0x1061, X::RemoteFx, Hints::REMOTE_FX),
            (0x1063, X::Container, Hints::CONTAINER),
            (0x1064, X::Nested, Hints::NESTED),
        ];
        for (device, feature, hint) in expected {
            let p = classify(DeviceIdentity::new(0x1AF4, device));
            assert_eq!(p.family, DeviceFamily::VirtioGpuExtended(feature), "{:#x}", device);
            assert!(p.hints.contains(hint | Hints::SUPPORTS_3D), "{:#x}", device);
            assert!(!p.hints.contains(Hints::EXTENDED_SUPPORT));
        }
        assert_eq!(family(0x1AF4, 0x1060), F::VirtioGpuExtended(X::HyperVDda));
        assert_eq!(family(0x1AF4, 0x1062), F::VirtioGpuExtended(X::EnhancedSession));
    }

    #[test]
    fn test_virtio_future_range() {
        let p = classify(DeviceIdentity::new(0x1AF4, 0x10A0));
        assert_eq!(p.family, DeviceFamily::VirtioGpuExtended(X::Future));
        assert!(p.hints.contains(Hints::EXTENDED_SUPPORT));
        // outside the GPU block
        assert_eq!(family(0x1AF4, 0x1041), F::Unknown);
        assert_eq!(family(0x1AF4, 0x1100), F::Unknown);
    }

    #[test]
    fn test_other_vendors_exact_and_range() {
        assert_eq!(family(0x1B36, 0x0100), F::Qxl);
        assert_eq!(family(0x1234, 0x1111), F::QemuVariant);
        assert_eq!(family(0x1234, 0x4ABC), F::QemuVariant);
        assert_eq!(family(0x1234, 0x2000), F::Unknown);
        assert_eq!(family(0x15AD, 0x0405), F::VMwareSVGA);
        assert_eq!(family(0x15AD, 0x07FF), F::VMwareSVGA);
        assert_eq!(family(0x15AD, 0x0900), F::Unknown);
        assert_eq!(family(0x8086, 0x3E92), F::IntelVirtualized);
        assert_eq!(family(0x8086, 0x9BFF), F::IntelVirtualized);
        assert_eq!(family(0x8086, 0x1234), F::Unknown);
        assert_eq!(family(0x1002, 0x164C), F::AMDVirtualized);
        assert_eq!(family(0x1002, 0x73BF), F::AMDVirtualized);
        assert_eq!(family(0x10DE, 0x2204), F::NVIDIAVirtualized);
        assert_eq!(family(0x10DE, 0x1B80), F::NVIDIAVirtualized);
        assert_eq!(family(0x1414, 0x5353), F::HyperVSynthetic);
        assert_eq!(family(0x1414, 0x535F), F::HyperVSynthetic);
        assert_eq!(family(0x1414, 0x5360), F::Unknown);
    }

    #[test]
    fn test_exact_beats_range() {
        let exact = classify(DeviceIdentity::new(0x15AD, 0x0405));
        let ranged = classify(DeviceIdentity::new(0x15AD, 0x0406));
        assert!(!exact.hints.contains(Hints::EXTENDED_SUPPORT));
        assert!(ranged.hints.contains(Hints::EXTENDED_SUPPORT));
    }

    #[test]
    fn test_dda_override_on_unknown_primary() {
        let p = classify(DeviceIdentity::new(0xABCD, 0x0001).with_subsystem(0x1414, 0xDDA2));
        assert_eq!(p.family, DeviceFamily::HyperVDDA);
        assert!(p.dda_passthrough);
        assert!(p.supports_3d());

        let generic = classify(DeviceIdentity::new(0xABCD, 0x0001).with_subsystem(0x1414, 0xDDAE));
        assert_eq!(generic.family, DeviceFamily::HyperVDDA);
        assert_eq!(generic.hints, Hints::empty());
    }

    #[test]
    fn test_dda_override_keeps_primary_hints() {
        let id = DeviceIdentity::new(0x10DE, 0x2204).with_subsystem(0x1414, 0xDDA1);
        let p = classify(id);
        assert_eq!(p.family, DeviceFamily::NVIDIAVirtualized);
        assert_eq!(p.hints, Hints::SUPPORTS_3D);
        assert!(p.dda_passthrough);
    }

    #[test]
    fn test_probe_scores() {
        assert_eq!(probe_score(DeviceIdentity::new(0x1AF4, 0x1050)), Some(PROBE_SCORE_VIRTIO));
        assert_eq!(probe_score(DeviceIdentity::new(0x1AF4, 0x105F)), Some(PROBE_SCORE_VIRTIO));
        assert_eq!(probe_score(DeviceIdentity::new(0x1B36, 0x0100)), Some(PROBE_SCORE_QXL));
        assert_eq!(probe_score(DeviceIdentity::new(0x15AD, 0x0405)), Some(PROBE_SCORE_OTHER));
        assert_eq!(probe_score(DeviceIdentity::new(0xDEAD, 0xBEEF)), None);
    }

    #[test]
    fn test_model_names() {
        assert_eq!(
            classify(DeviceIdentity::new(0x1AF4, 0x1054)).model_name(),
            "VirtIO GPU (HDR)"
        );
        assert_eq!(DeviceProfile::UNKNOWN.model_name(), "Unknown Display Adapter");
    }

    const KNOWN_VENDORS: [u16; 8] = [
        VENDOR_REDHAT_VIRTIO,
        VENDOR_REDHAT_QXL,
        VENDOR_QEMU,
        VENDOR_VMWARE,
        VENDOR_INTEL,
        VENDOR_AMD,
        VENDOR_NVIDIA,
        VENDOR_MICROSOFT,
    ];

    proptest! {
        #[test]
        fn prop_foreign_vendor_is_unknown(
            vendor in any::<u16>(),
            device in any::<u16>(),
            sub_vendor in any::<u16>(),
            sub in any::<u16>(),
        ) {
            prop_assume!(!KNOWN_VENDORS.contains(&vendor));
            prop_assume!(sub_vendor != VENDOR_MICROSOFT);
            let p = classify(DeviceIdentity::new(vendor, device).with_subsystem(sub_vendor, sub));
            prop_assert_eq!(p, DeviceProfile::UNKNOWN);
        }

        #[test]
        fn prop_recognized_iff_not_unknown(
            vendor in prop::sample::select(KNOWN_VENDORS.to_vec()),
            device in any::<u16>(),
        ) {
            let p = classify(DeviceIdentity::new(vendor, device));
            prop_assert_eq!(p.recognized, p.family != DeviceFamily::Unknown);
        }
    }
}
