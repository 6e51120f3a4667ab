//! Platform enumeration with connectivity testing
//!
//! Some platforms report a device interface as enabled while the device is
//! transiently unopenable (driver claimed by another process, permissions).
//! The two-phase enumerate-then-test pass here keeps such phantom devices
//! out of the definitions surfaced to callers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::DeviceError;
use crate::types::{ConnectedDeviceDefinition, ConnectionInfo, DeviceFilter, DeviceKind};

/// Raw record returned by a platform enumeration query
#[derive(Debug, Clone)]
pub struct PlatformDeviceInfo {
    /// Platform-native device id
    pub device_id: String,
    /// Human-readable name, if the platform reports one
    pub product_name: Option<String>,
    /// Vendor id, if the platform resolved it
    pub vendor_id: Option<u16>,
    /// Product id, if the platform resolved it
    pub product_id: Option<u16>,
}

/// Specialization layer over a platform's native device-information query
///
/// Implementors supply the platform glue: the query clause syntax, the query
/// itself, and the connectivity test. The provided methods turn those into
/// the uniform filtered, connectivity-tested definition sequence.
#[async_trait]
pub trait PlatformEnumerator: Send + Sync {
    /// Kind of device this enumerator discovers
    fn device_kind(&self) -> DeviceKind;

    /// Base clause restricting the query to enabled interfaces
    fn interface_enabled_clause(&self) -> &str;

    /// Property key for the vendor-id clause
    fn vendor_clause_key(&self) -> &str;

    /// Property key for the product-id clause
    fn product_clause_key(&self) -> &str;

    /// Run the native query and return the raw results
    async fn query(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<PlatformDeviceInfo>, DeviceError>;

    /// Probe whether an enumerated device can actually be opened
    ///
    /// Unreachability is a normal negative result, not an error; this must
    /// not fail for a device that is merely unopenable.
    async fn test_connection(&self, device_id: &str) -> ConnectionInfo;

    /// Build the native query string for a filter
    ///
    /// Vendor and product clauses are added conjunctively, each present only
    /// when the filter specifies the corresponding id.
    fn build_query(&self, filter: &DeviceFilter) -> String {
        let mut query = self.interface_enabled_clause().to_owned();
        if let Some(vendor_id) = filter.vendor_id {
            query.push_str(&format!(" AND {}:={}", self.vendor_clause_key(), vendor_id));
        }
        if let Some(product_id) = filter.product_id {
            query.push_str(&format!(
                " AND {}:={}",
                self.product_clause_key(),
                product_id
            ));
        }
        query
    }

    /// Enumerate connected, connectable devices matching a filter
    ///
    /// Every raw query result is connectivity-tested before inclusion;
    /// surviving definitions carry the usage page reported by the test.
    /// There is no retry for a failed test within one pass. Cancellation
    /// yields an error, never a partial list.
    async fn connected_definitions(
        &self,
        filter: &DeviceFilter,
        cancel: CancellationToken,
    ) -> Result<Vec<ConnectedDeviceDefinition>, DeviceError> {
        if cancel.is_cancelled() {
            return Err(DeviceError::Cancelled);
        }

        let query = self.build_query(filter);
        debug!(query = %query, "running platform enumeration query");
        let raw = self.query(&query, cancel.clone()).await?;

        let mut definitions = Vec::with_capacity(raw.len());
        for info in raw {
            if cancel.is_cancelled() {
                return Err(DeviceError::Cancelled);
            }

            let connection = self.test_connection(&info.device_id).await;
            if !connection.can_connect {
                debug!(device_id = %info.device_id, "enumerated but not connectable, skipping");
                continue;
            }

            let mut definition =
                ConnectedDeviceDefinition::new(info.device_id, self.device_kind());
            definition.vendor_id = info.vendor_id;
            definition.product_id = info.product_id;
            definition.product_name = info.product_name;
            definition.usage_page = connection.usage_page;
            definitions.push(definition);
        }

        info!(count = definitions.len(), "enumeration pass complete");
        Ok(definitions)
    }
}
