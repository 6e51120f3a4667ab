//! Device error types

use thiserror::Error;

/// Errors that can occur during device discovery and I/O
#[derive(Error, Debug)]
pub enum DeviceError {
    // Argument errors
    #[error("No device definition supplied")]
    MissingDefinition,

    // Lifecycle errors
    #[error("Device has already been disposed")]
    Disposed,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    // Transport errors
    #[error("HID error: {0}")]
    Hid(String),

    #[error("HID permission denied: {0}")]
    PermissionDenied(String),

    #[error("Write of {length} bytes exceeds write buffer size {write_buffer_size}")]
    WriteBufferOverflow {
        length: usize,
        write_buffer_size: u16,
    },

    #[error("Empty report buffer")]
    EmptyBuffer,

    // Discovery and construction
    #[error("Enumeration failed: {0}")]
    Enumeration(String),

    #[error("Failed to open device: {0}")]
    Construction(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<hidapi::HidError> for DeviceError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            DeviceError::PermissionDenied(msg)
        } else {
            DeviceError::Hid(msg)
        }
    }
}
