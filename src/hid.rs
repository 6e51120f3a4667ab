//! HID backend over hidapi
//!
//! Reference transport implementation: a `Transport` wrapping an open
//! `hidapi::HidDevice`, and a `DeviceFactory` that enumerates via the hidapi
//! device list and probe-opens every candidate before surfacing it.

use std::ffi::CString;
use std::sync::Arc;

use async_trait::async_trait;
use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::DeviceError;
use crate::factory::DeviceFactory;
use crate::types::{ConnectedDeviceDefinition, ConnectionInfo, DeviceFilter, DeviceKind};
use crate::Transport;

/// Report size used when the caller does not override it
pub const DEFAULT_REPORT_SIZE: u16 = 64;

/// Transport over an open HID handle
///
/// Report sizes are fixed at construction. Writes are prefixed with report
/// id zero and padded to the full report length; oversized writes are
/// rejected rather than truncated.
pub struct HidTransport {
    device: Mutex<HidDevice>,
    read_buffer_size: u16,
    write_buffer_size: u16,
}

impl HidTransport {
    /// Wrap an open handle with the default report sizes
    pub fn new(device: HidDevice) -> Self {
        Self::with_report_sizes(device, DEFAULT_REPORT_SIZE, DEFAULT_REPORT_SIZE)
    }

    /// Wrap an open handle with explicit report sizes
    pub fn with_report_sizes(
        device: HidDevice,
        read_buffer_size: u16,
        write_buffer_size: u16,
    ) -> Self {
        Self {
            device: Mutex::new(device),
            read_buffer_size,
            write_buffer_size,
        }
    }
}

#[async_trait]
impl Transport for HidTransport {
    async fn read(&self) -> Result<Vec<u8>, DeviceError> {
        let device = self.device.lock();
        let mut buf = vec![0u8; self.read_buffer_size as usize];
        device.read(&mut buf)?;
        Ok(buf)
    }

    async fn write(&self, data: &[u8]) -> Result<(), DeviceError> {
        if data.len() > self.write_buffer_size as usize {
            return Err(DeviceError::WriteBufferOverflow {
                length: data.len(),
                write_buffer_size: self.write_buffer_size,
            });
        }

        // Report id 0, payload, zero padding to the full report length.
        let mut buf = vec![0u8; self.write_buffer_size as usize + 1];
        buf[1..=data.len()].copy_from_slice(data);

        let device = self.device.lock();
        device.write(&buf)?;
        Ok(())
    }

    fn read_buffer_size(&self) -> u16 {
        self.read_buffer_size
    }

    fn write_buffer_size(&self) -> u16 {
        self.write_buffer_size
    }

    fn is_initialized(&self) -> bool {
        // The handle is open from construction.
        true
    }
}

/// Factory for HID-class devices matching a filter
pub struct HidDeviceFactory {
    filter: DeviceFilter,
}

impl HidDeviceFactory {
    /// Create a factory for devices passing `filter`
    pub fn new(filter: DeviceFilter) -> Self {
        Self { filter }
    }

    fn definition_from(info: &hidapi::DeviceInfo) -> ConnectedDeviceDefinition {
        let mut definition = ConnectedDeviceDefinition::new(
            info.path().to_string_lossy().into_owned(),
            DeviceKind::Hid,
        );
        definition.vendor_id = Some(info.vendor_id());
        definition.product_id = Some(info.product_id());
        definition.product_name = info.product_string().map(|s| s.to_string());
        definition
    }

    /// Probe-open a listed interface
    ///
    /// Listing a device does not mean it can be opened; the handle may be
    /// claimed elsewhere or blocked by permissions. Unopenable interfaces
    /// are a negative result, not an error.
    fn probe(api: &HidApi, info: &hidapi::DeviceInfo) -> ConnectionInfo {
        match info.open_device(api) {
            Ok(_handle) => ConnectionInfo::connectable(Some(info.usage_page())),
            Err(e) => {
                debug!(
                    path = %info.path().to_string_lossy(),
                    error = %e,
                    "device listed but not openable"
                );
                ConnectionInfo::unreachable()
            }
        }
    }
}

#[async_trait]
impl DeviceFactory for HidDeviceFactory {
    async fn connected_definitions(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<ConnectedDeviceDefinition>, DeviceError> {
        let api = HidApi::new().map_err(|e| DeviceError::Enumeration(e.to_string()))?;

        let mut definitions = Vec::new();
        for info in api.device_list() {
            if cancel.is_cancelled() {
                return Err(DeviceError::Cancelled);
            }
            if !self.filter.matches(info.vendor_id(), info.product_id()) {
                continue;
            }

            let connection = Self::probe(&api, info);
            if !connection.can_connect {
                continue;
            }

            let mut definition = Self::definition_from(info);
            definition.usage_page = connection.usage_page;
            definitions.push(definition);
        }

        info!(count = definitions.len(), "hid enumeration pass complete");
        Ok(definitions)
    }

    async fn supports_device(
        &self,
        definition: &ConnectedDeviceDefinition,
        _cancel: CancellationToken,
    ) -> Result<bool, DeviceError> {
        Ok(definition.kind == DeviceKind::Hid && self.filter.matches_definition(definition))
    }

    async fn open_device(
        &self,
        definition: Option<&ConnectedDeviceDefinition>,
        _cancel: CancellationToken,
    ) -> Result<Device, DeviceError> {
        let definition = definition.ok_or(DeviceError::MissingDefinition)?;

        let api = HidApi::new().map_err(|e| DeviceError::Construction(e.to_string()))?;
        let path = CString::new(definition.device_id.as_bytes())
            .map_err(|_| DeviceError::DeviceNotFound(definition.device_id.clone()))?;
        let handle = api
            .open_path(&path)
            .map_err(|e| DeviceError::Construction(e.to_string()))?;

        debug!(device_id = %definition.device_id, "opened hid device");
        Ok(Device::new(
            definition.clone(),
            Arc::new(HidTransport::new(handle)),
        ))
    }
}
