//! Common types for device discovery

use serde::{Deserialize, Serialize};

/// Kind of transport a device speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// HID-class device (feature/input reports)
    Hid,
    /// USB bulk-class device
    Usb,
    /// Serial device
    Serial,
}

/// Identity record for a device discovered in one enumeration pass
///
/// Definitions are created fresh on every enumeration and never mutated after
/// being returned. A device that disconnects and reconnects is a new
/// definition even when its ids match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedDeviceDefinition {
    /// Platform-native device id (opaque, platform-dependent format)
    pub device_id: String,
    /// USB vendor id, if the platform resolved it
    pub vendor_id: Option<u16>,
    /// USB product id, if the platform resolved it
    pub product_id: Option<u16>,
    /// HID usage page reported by the connectivity test
    pub usage_page: Option<u16>,
    /// Kind of transport
    pub kind: DeviceKind,
    /// Product name if available
    pub product_name: Option<String>,
}

impl ConnectedDeviceDefinition {
    /// Create a definition with only the native id and kind filled in
    pub fn new(device_id: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            device_id: device_id.into(),
            vendor_id: None,
            product_id: None,
            usage_page: None,
            kind,
            product_name: None,
        }
    }
}

/// Caller-side filter applied during enumeration
///
/// An unset field matches every device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// USB vendor id to match
    pub vendor_id: Option<u16>,
    /// USB product id to match
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Filter matching every device
    pub fn any() -> Self {
        Self::default()
    }

    /// Filter on a vendor id
    pub fn vendor(vendor_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: None,
        }
    }

    /// Filter on a vendor/product pair
    pub fn vendor_product(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    /// Check whether a concrete vendor/product pair passes the filter
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.map_or(true, |vid| vid == vendor_id)
            && self.product_id.map_or(true, |pid| pid == product_id)
    }

    /// Check whether a definition's ids pass the filter
    ///
    /// A definition with an unresolved id only passes when the corresponding
    /// filter field is unset.
    pub fn matches_definition(&self, definition: &ConnectedDeviceDefinition) -> bool {
        let vendor_ok = match self.vendor_id {
            Some(vid) => definition.vendor_id == Some(vid),
            None => true,
        };
        let product_ok = match self.product_id {
            Some(pid) => definition.product_id == Some(pid),
            None => true,
        };
        vendor_ok && product_ok
    }
}

/// Result of a connectivity test
///
/// Some platforms report a device as enabled while it is transiently
/// unopenable (driver claimed by another process, permissions). A negative
/// result is normal, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Whether a handle could actually be opened
    pub can_connect: bool,
    /// HID usage page observed while probing
    pub usage_page: Option<u16>,
}

impl ConnectionInfo {
    /// Positive probe result
    pub fn connectable(usage_page: Option<u16>) -> Self {
        Self {
            can_connect: true,
            usage_page,
        }
    }

    /// Negative probe result
    pub fn unreachable() -> Self {
        Self {
            can_connect: false,
            usage_page: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_any_matches_everything() {
        let filter = DeviceFilter::any();
        assert!(filter.matches(0x1234, 0x5678));
        assert!(filter.matches(0x0000, 0x0000));
    }

    #[test]
    fn test_filter_vendor_only() {
        let filter = DeviceFilter::vendor(0x1234);
        assert!(filter.matches(0x1234, 0x5678));
        assert!(filter.matches(0x1234, 0x9999));
        assert!(!filter.matches(0x4321, 0x5678));
    }

    #[test]
    fn test_filter_vendor_product() {
        let filter = DeviceFilter::vendor_product(0x1234, 0x5678);
        assert!(filter.matches(0x1234, 0x5678));
        assert!(!filter.matches(0x1234, 0x9999));
    }

    #[test]
    fn test_filter_rejects_unresolved_definition_ids() {
        let filter = DeviceFilter::vendor(0x1234);
        let definition = ConnectedDeviceDefinition::new("dev0", DeviceKind::Hid);
        assert!(!filter.matches_definition(&definition));

        let mut resolved = definition;
        resolved.vendor_id = Some(0x1234);
        assert!(filter.matches_definition(&resolved));
    }
}
