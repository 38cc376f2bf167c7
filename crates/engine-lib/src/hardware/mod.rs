//! GPU hardware classification from PCI bus enumeration
//!
//! This module turns raw vendor/device ID pairs into normalized
//! hardware profiles. Classification is pure: unrecognized or
//! malformed records degrade to a software-only profile instead of
//! failing the request.

mod sysfs;

pub use sysfs::SysfsEnumerator;

use crate::models::{GpuVendor, HardwareProfile, RawBusRecord};
use anyhow::Result;

pub use async_trait::async_trait;

/// PCI vendor ID constants, in declared priority order
const VENDOR_TABLE: &[(u16, GpuVendor)] = &[
    (0x10de, GpuVendor::Nvidia),
    (0x1002, GpuVendor::Amd),
    (0x8086, GpuVendor::Intel),
];

/// Capability tier for an unrecognized device
const UNKNOWN_CLASS: &str = "unknown";

/// Device-ID range predicates per vendor, first match wins
///
/// Declared order is the tie-break, so this stays an explicit slice
/// rather than any associative structure.
const DEVICE_CLASS_TABLE: &[(GpuVendor, u16, u16, &str)] = &[
    // AMD discrete tiers (Navi device ID ranges)
    (GpuVendor::Amd, 0x7550, 0x75ff, "RDNA4"),
    (GpuVendor::Amd, 0x7400, 0x754f, "RDNA3"),
    (GpuVendor::Amd, 0x73a0, 0x73ff, "RDNA2"),
    (GpuVendor::Amd, 0x0000, 0xffff, "Radeon"),
    // NVIDIA generations
    (GpuVendor::Nvidia, 0x2900, 0x2bff, "Blackwell"),
    (GpuVendor::Nvidia, 0x2680, 0x28ff, "Ada"),
    (GpuVendor::Nvidia, 0x0000, 0xffff, "CUDA-capable"),
    // Intel discrete vs integrated
    (GpuVendor::Intel, 0x56a0, 0x56ff, "Arc"),
    (GpuVendor::Intel, 0xe200, 0xe2ff, "Arc"),
    (GpuVendor::Intel, 0x0000, 0xffff, "Xe"),
];

/// Primary-GPU selection priority: NVIDIA > AMD > Intel
const PRIMARY_PRIORITY: &[GpuVendor] = &[GpuVendor::Nvidia, GpuVendor::Amd, GpuVendor::Intel];

/// Classify raw PCI bus records into hardware profiles
///
/// Pure function over its input. An empty record set produces an
/// empty profile list; "no GPU" is a valid outcome, not an error.
pub fn classify(records: &[RawBusRecord]) -> Vec<HardwareProfile> {
    records.iter().map(classify_record).collect()
}

fn classify_record(record: &RawBusRecord) -> HardwareProfile {
    let vendor = match parse_pci_id(&record.vendor_id) {
        Some(id) => VENDOR_TABLE
            .iter()
            .find(|(vendor_id, _)| *vendor_id == id)
            .map(|(_, vendor)| *vendor)
            .unwrap_or(GpuVendor::None),
        None => {
            tracing::debug!(
                vendor_id = %record.vendor_id,
                bus_address = %record.bus_address,
                "Malformed vendor ID, treating as unknown hardware"
            );
            GpuVendor::None
        }
    };

    let device_class = resolve_device_class(vendor, parse_pci_id(&record.device_id));

    HardwareProfile {
        vendor,
        device_class,
        bus_address: record.bus_address.clone(),
    }
}

/// Resolve the capability tier via the ordered range table
fn resolve_device_class(vendor: GpuVendor, device_id: Option<u16>) -> String {
    if vendor == GpuVendor::None {
        return UNKNOWN_CLASS.to_string();
    }

    let Some(id) = device_id else {
        return UNKNOWN_CLASS.to_string();
    };

    DEVICE_CLASS_TABLE
        .iter()
        .find(|(v, lo, hi, _)| *v == vendor && id >= *lo && id <= *hi)
        .map(|(_, _, _, class)| class.to_string())
        .unwrap_or_else(|| UNKNOWN_CLASS.to_string())
}

/// Parse a 4-hex-digit PCI identifier, rejecting anything else
fn parse_pci_id(raw: &str) -> Option<u16> {
    let trimmed = raw.trim().trim_start_matches("0x");
    if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(trimmed, 16).ok()
}

/// Select the primary GPU from a detection run
///
/// Vendor priority mirrors which vendor benefits acceleration most;
/// within a vendor, input order breaks ties.
pub fn select_primary(profiles: &[HardwareProfile]) -> Option<&HardwareProfile> {
    for vendor in PRIMARY_PRIORITY {
        if let Some(profile) = profiles.iter().find(|p| p.vendor == *vendor) {
            return Some(profile);
        }
    }
    None
}

/// The degraded profile used when no GPU is detected
pub fn software_profile() -> HardwareProfile {
    HardwareProfile {
        vendor: GpuVendor::None,
        device_class: UNKNOWN_CLASS.to_string(),
        bus_address: String::new(),
    }
}

/// Source of raw PCI bus records
///
/// The engine classifies whatever an enumerator hands it; tests use a
/// fixed record set, production reads sysfs.
#[async_trait]
pub trait BusEnumerator: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<RawBusRecord>>;
}

/// Fixed-record enumerator for tests and pre-classified requests
pub struct StaticEnumerator {
    records: Vec<RawBusRecord>,
}

impl StaticEnumerator {
    pub fn new(records: Vec<RawBusRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl BusEnumerator for StaticEnumerator {
    async fn enumerate(&self) -> Result<Vec<RawBusRecord>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(vendor_id: &str, device_id: &str, bus: &str) -> RawBusRecord {
        RawBusRecord {
            vendor_id: vendor_id.to_string(),
            device_id: device_id.to_string(),
            bus_address: bus.to_string(),
        }
    }

    #[test]
    fn test_classify_nvidia() {
        let profiles = classify(&[record("10de", "2684", "0000:01:00.0")]);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].vendor, GpuVendor::Nvidia);
        assert_eq!(profiles[0].device_class, "Ada");
        assert_eq!(profiles[0].bus_address, "0000:01:00.0");
    }

    #[test]
    fn test_classify_amd_rdna_tiers() {
        let profiles = classify(&[
            record("1002", "7550", "0000:03:00.0"),
            record("1002", "744c", "0000:04:00.0"),
            record("1002", "73bf", "0000:05:00.0"),
            record("1002", "6810", "0000:06:00.0"),
        ]);
        let classes: Vec<&str> = profiles.iter().map(|p| p.device_class.as_str()).collect();
        assert_eq!(classes, vec!["RDNA4", "RDNA3", "RDNA2", "Radeon"]);
    }

    #[test]
    fn test_classify_intel_arc() {
        let profiles = classify(&[record("8086", "56a0", "0000:03:00.0")]);
        assert_eq!(profiles[0].vendor, GpuVendor::Intel);
        assert_eq!(profiles[0].device_class, "Arc");
    }

    #[test]
    fn test_unknown_vendor_degrades_to_none() {
        let profiles = classify(&[record("dead", "beef", "0000:09:00.0")]);
        assert_eq!(profiles[0].vendor, GpuVendor::None);
        assert_eq!(profiles[0].device_class, "unknown");
    }

    #[test]
    fn test_malformed_vendor_id_never_fails() {
        for bad in ["", "1", "xyzw", "10del", "0x10de0", "10 de"] {
            let profiles = classify(&[record(bad, "2684", "0000:01:00.0")]);
            assert_eq!(profiles[0].vendor, GpuVendor::None, "input: {:?}", bad);
        }
    }

    #[test]
    fn test_classify_empty_input() {
        assert!(classify(&[]).is_empty());
    }

    #[test]
    fn test_first_match_wins_preserves_table_order() {
        // 0x7550 sits in the RDNA4 range; the catch-all Radeon range
        // also matches but is declared later.
        let profiles = classify(&[record("1002", "7550", "0000:03:00.0")]);
        assert_eq!(profiles[0].device_class, "RDNA4");
    }

    #[test]
    fn test_select_primary_prefers_discrete_nvidia() {
        let profiles = classify(&[
            record("8086", "46a6", "0000:00:02.0"),
            record("10de", "2684", "0000:01:00.0"),
        ]);
        let primary = select_primary(&profiles).unwrap();
        assert_eq!(primary.vendor, GpuVendor::Nvidia);
    }

    #[test]
    fn test_select_primary_amd_over_intel() {
        let profiles = classify(&[
            record("8086", "46a6", "0000:00:02.0"),
            record("1002", "744c", "0000:01:00.0"),
        ]);
        assert_eq!(select_primary(&profiles).unwrap().vendor, GpuVendor::Amd);
    }

    #[test]
    fn test_select_primary_none_when_no_recognized_gpu() {
        let profiles = classify(&[record("ffff", "0000", "0000:00:02.0")]);
        assert!(select_primary(&profiles).is_none());
    }

    #[tokio::test]
    async fn test_static_enumerator() {
        let enumerator = StaticEnumerator::new(vec![record("10de", "2684", "0000:01:00.0")]);
        let records = enumerator.enumerate().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vendor_id, "10de");
    }
}
