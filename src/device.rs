//! Live device handles with the synchronized transaction contract

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::DeviceError;
use crate::types::ConnectedDeviceDefinition;
use crate::Transport;

/// A live communication handle bound to exactly one definition
///
/// At most one `write_and_read` transaction is in flight per handle: the
/// compound operation serializes behind a capacity-one semaphore. Direct
/// `read`/`write` calls bypass the guard on purpose - they are the low-level
/// escape hatch for callers that manage their own serialization (streaming
/// reads).
///
/// Handles are constructed by a factory's construction behavior and disposed
/// at most once; after `dispose` every operation fails fast without touching
/// the transport.
pub struct Device {
    definition: ConnectedDeviceDefinition,
    device_id: String,
    transport: Arc<dyn Transport>,
    io_lock: Semaphore,
    disposed: AtomicBool,
}

impl Device {
    /// Bind a transport to a definition
    pub fn new(definition: ConnectedDeviceDefinition, transport: Arc<dyn Transport>) -> Self {
        let device_id = definition.device_id.clone();
        Self {
            definition,
            device_id,
            transport,
            io_lock: Semaphore::new(1),
            disposed: AtomicBool::new(false),
        }
    }

    /// The definition this handle was constructed from
    pub fn definition(&self) -> &ConnectedDeviceDefinition {
        &self.definition
    }

    /// Device-scoped identifier
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Size of one inbound report
    pub fn read_buffer_size(&self) -> u16 {
        self.transport.read_buffer_size()
    }

    /// Size of one outbound report
    pub fn write_buffer_size(&self) -> u16 {
        self.transport.write_buffer_size()
    }

    /// Whether the backend reports its handle open
    pub fn is_initialized(&self) -> bool {
        self.transport.is_initialized()
    }

    /// Whether this handle has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), DeviceError> {
        if self.is_disposed() {
            return Err(DeviceError::Disposed);
        }
        Ok(())
    }

    /// Read one report, bypassing the exclusive-access guard
    pub async fn read(&self) -> Result<Vec<u8>, DeviceError> {
        self.ensure_live()?;
        self.transport.read().await
    }

    /// Write one report, bypassing the exclusive-access guard
    pub async fn write(&self, data: &[u8]) -> Result<(), DeviceError> {
        self.ensure_live()?;
        self.transport.write(data).await
    }

    /// Write then read as one exclusive transaction
    ///
    /// Suspends the calling task until the guard is available; queued callers
    /// each acquire it exactly once, in no specified order. The permit is
    /// released on every exit path - success, transport failure, or the
    /// future being dropped. There is no cancellation point past acquisition:
    /// once the guard is held, the write/read pair runs to completion or
    /// transport failure.
    pub async fn write_and_read(&self, write_buffer: &[u8]) -> Result<Vec<u8>, DeviceError> {
        self.ensure_live()?;
        let _permit = self
            .io_lock
            .acquire()
            .await
            .map_err(|_| DeviceError::Disposed)?;

        self.transport.write(write_buffer).await?;
        self.transport.read().await
    }

    /// Dispose the handle
    ///
    /// Idempotent and infallible. The first call closes the guard, turning
    /// queued waiters into disposed errors; later calls are no-ops. Callers
    /// must not dispose while a transaction they started is still in flight.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.io_lock.close();
        debug!(device_id = %self.device_id, "device disposed");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Strip the leading byte from a report buffer
///
/// Some platforms prepend a report id byte to every HID report; stripping it
/// keeps buffers comparable across platforms.
pub fn remove_first_byte(bytes: &[u8]) -> Result<Vec<u8>, DeviceError> {
    match bytes.split_first() {
        Some((_, rest)) => Ok(rest.to_vec()),
        None => Err(DeviceError::EmptyBuffer),
    }
}
