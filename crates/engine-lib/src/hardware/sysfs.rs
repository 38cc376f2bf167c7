//! PCI bus enumeration from the sysfs hierarchy
//!
//! Reads vendor/device identifiers from /sys/bus/pci/devices, keeping
//! only display controllers (PCI class 0x03). Enumeration failures
//! degrade to an empty record set so a missing or masked sysfs (for
//! example inside a container) never fails a deploy request.

use super::BusEnumerator;
use crate::models::RawBusRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// PCI base class for display controllers
const DISPLAY_CLASS: u8 = 0x03;

/// Enumerator backed by the sysfs PCI device tree
pub struct SysfsEnumerator {
    pci_root: PathBuf,
}

impl SysfsEnumerator {
    pub fn new() -> Self {
        Self {
            pci_root: PathBuf::from("/sys/bus/pci/devices"),
        }
    }

    /// Create an enumerator with a custom root (for testing)
    pub fn with_root(pci_root: impl Into<PathBuf>) -> Self {
        Self {
            pci_root: pci_root.into(),
        }
    }

    /// Read a single sysfs attribute file, e.g. "vendor" -> "0x10de"
    async fn read_attribute(device_dir: &Path, name: &str) -> Result<String> {
        let path = device_dir.join(name);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(content.trim().to_string())
    }

    /// Parse a sysfs "class" attribute into the PCI base class byte
    ///
    /// Format is a 24-bit hex value like "0x030000" (VGA controller).
    fn parse_base_class(raw: &str) -> Option<u8> {
        let value = u32::from_str_radix(raw.trim_start_matches("0x"), 16).ok()?;
        Some((value >> 16) as u8)
    }

    /// Strip the sysfs "0x" prefix from a vendor/device attribute
    fn strip_id(raw: &str) -> String {
        raw.trim_start_matches("0x").to_string()
    }

    async fn scan(&self) -> Result<Vec<RawBusRecord>> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.pci_root)
            .await
            .with_context(|| format!("Failed to read {}", self.pci_root.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let device_dir = entry.path();
            let bus_address = entry.file_name().to_string_lossy().to_string();

            let class_raw = match Self::read_attribute(&device_dir, "class").await {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(device = %bus_address, error = %e, "Skipping device without class attribute");
                    continue;
                }
            };

            if Self::parse_base_class(&class_raw) != Some(DISPLAY_CLASS) {
                continue;
            }

            let vendor_id = Self::read_attribute(&device_dir, "vendor")
                .await
                .map(|v| Self::strip_id(&v))
                .unwrap_or_default();
            let device_id = Self::read_attribute(&device_dir, "device")
                .await
                .map(|v| Self::strip_id(&v))
                .unwrap_or_default();

            records.push(RawBusRecord {
                vendor_id,
                device_id,
                bus_address,
            });
        }

        Ok(records)
    }
}

impl Default for SysfsEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusEnumerator for SysfsEnumerator {
    async fn enumerate(&self) -> Result<Vec<RawBusRecord>> {
        match self.scan().await {
            Ok(records) => {
                debug!(count = records.len(), "Enumerated PCI display controllers");
                Ok(records)
            }
            Err(e) => {
                warn!(error = %e, "PCI enumeration failed, degrading to no-GPU profile");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_device(root: &Path, address: &str, vendor: &str, device: &str, class: &str) {
        let dir = root.join(address);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("vendor"), format!("{}\n", vendor))
            .await
            .unwrap();
        fs::write(dir.join("device"), format!("{}\n", device))
            .await
            .unwrap();
        fs::write(dir.join("class"), format!("{}\n", class))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_enumerate_filters_to_display_controllers() {
        let tmp = TempDir::new().unwrap();
        write_device(tmp.path(), "0000:01:00.0", "0x10de", "0x2684", "0x030000").await;
        write_device(tmp.path(), "0000:02:00.0", "0x8086", "0x15f3", "0x020000").await; // NIC

        let enumerator = SysfsEnumerator::with_root(tmp.path());
        let records = enumerator.enumerate().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vendor_id, "10de");
        assert_eq!(records[0].device_id, "2684");
        assert_eq!(records[0].bus_address, "0000:01:00.0");
    }

    #[tokio::test]
    async fn test_enumerate_missing_root_degrades_to_empty() {
        let enumerator = SysfsEnumerator::with_root("/nonexistent/pci/root");
        let records = enumerator.enumerate().await.unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_base_class() {
        assert_eq!(SysfsEnumerator::parse_base_class("0x030000"), Some(0x03));
        assert_eq!(SysfsEnumerator::parse_base_class("0x038000"), Some(0x03));
        assert_eq!(SysfsEnumerator::parse_base_class("0x020000"), Some(0x02));
        assert_eq!(SysfsEnumerator::parse_base_class("garbage"), None);
    }
}
