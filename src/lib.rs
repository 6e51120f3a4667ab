//! Transport abstraction layer for connected hardware devices
//!
//! This crate provides a uniform discovery-and-I/O contract for USB/HID-class
//! devices, independent of the underlying platform's enumeration API:
//!
//! - `Transport` - the raw read/write capability a backend implements
//! - `Device` - a live handle adding the synchronized transaction contract
//! - `DeviceFactory` - discovery, support checking and device construction
//!   behind one interface
//! - `PlatformEnumerator` - specialization layer for platforms that take a
//!   textual query predicate, with a connectivity test run over every raw
//!   enumeration result

pub mod device;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod types;

mod hid;
mod trace;

pub use device::{remove_first_byte, Device};
pub use discovery::{PlatformDeviceInfo, PlatformEnumerator};
pub use error::DeviceError;
pub use factory::{
    AggregateDeviceFactory, ComposedDeviceFactory, ConstructDevice, DeviceFactory,
    EnumerateDevices, SupportsDevice,
};
pub use hid::{HidDeviceFactory, HidTransport, DEFAULT_REPORT_SIZE};
pub use trace::{TraceConfig, TraceFormat, TraceTransport};
pub use types::{ConnectedDeviceDefinition, ConnectionInfo, DeviceFilter, DeviceKind};

use async_trait::async_trait;
use std::sync::Arc;

/// The raw transport capability - all backends implement this
///
/// A transport owns an open handle with fixed report sizes. It performs no
/// serialization of its own; `Device` layers the exclusive-access guard on
/// top, and direct callers manage their own.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read one report of exactly `read_buffer_size` bytes
    async fn read(&self) -> Result<Vec<u8>, DeviceError>;

    /// Write one report
    ///
    /// `data` must not exceed `write_buffer_size`; a backend may pad a short
    /// buffer or reject an oversized one.
    async fn write(&self, data: &[u8]) -> Result<(), DeviceError>;

    /// Size of one inbound report, fixed for the handle's lifetime
    fn read_buffer_size(&self) -> u16;

    /// Size of one outbound report, fixed for the handle's lifetime
    fn write_buffer_size(&self) -> u16;

    /// Whether the backend has finished opening its handle
    ///
    /// Reads and writes before this reports `true` are backend-defined: the
    /// transport decides whether they fail or queue.
    fn is_initialized(&self) -> bool;
}

/// Type alias for a boxed transport
pub type BoxedTransport = Arc<dyn Transport>;
