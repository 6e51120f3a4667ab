//! Trace middleware for monitoring device I/O
//!
//! Wraps any `Transport` and logs every transfer passing through it. Useful
//! when bringing up a new backend or diagnosing a misbehaving device without
//! touching the calling code:
//!
//! ```ignore
//! let transport = TraceTransport::wrap(transport, TraceConfig::default());
//! let device = Device::new(definition, transport);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::DeviceError;
use crate::Transport;

/// Output format for trace lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceFormat {
    /// Structured log fields with a hex payload
    #[default]
    Hex,
    /// One JSON object per transfer
    Json,
}

/// Configuration for the trace middleware
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceConfig {
    /// Output format
    pub format: TraceFormat,
}

impl TraceConfig {
    /// Create config with the given output format
    pub fn with_format(mut self, format: TraceFormat) -> Self {
        self.format = format;
        self
    }
}

#[derive(Serialize)]
struct TraceRecord<'a> {
    direction: &'static str,
    length: usize,
    data: &'a str,
}

/// Transport middleware that logs all transfers
pub struct TraceTransport {
    inner: Arc<dyn Transport>,
    config: TraceConfig,
}

impl TraceTransport {
    /// Wrap a transport with tracing middleware
    pub fn wrap(inner: Arc<dyn Transport>, config: TraceConfig) -> Arc<dyn Transport> {
        Arc::new(Self { inner, config })
    }

    fn emit(&self, direction: &'static str, data: &[u8]) {
        let hex = to_hex(data);
        match self.config.format {
            TraceFormat::Hex => {
                debug!(direction, length = data.len(), data = %hex, "transfer");
            }
            TraceFormat::Json => {
                let record = TraceRecord {
                    direction,
                    length: data.len(),
                    data: &hex,
                };
                if let Ok(line) = serde_json::to_string(&record) {
                    debug!(transfer = %line);
                }
            }
        }
    }
}

#[async_trait]
impl Transport for TraceTransport {
    async fn read(&self) -> Result<Vec<u8>, DeviceError> {
        let data = self.inner.read().await?;
        self.emit("read", &data);
        Ok(data)
    }

    async fn write(&self, data: &[u8]) -> Result<(), DeviceError> {
        self.emit("write", data);
        self.inner.write(data).await
    }

    fn read_buffer_size(&self) -> u16 {
        self.inner.read_buffer_size()
    }

    fn write_buffer_size(&self) -> u16 {
        self.inner.write_buffer_size()
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }
}

fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoTransport {
        written: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn read(&self) -> Result<Vec<u8>, DeviceError> {
            Ok(vec![0xAB; 4])
        }

        async fn write(&self, data: &[u8]) -> Result<(), DeviceError> {
            self.written.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        fn read_buffer_size(&self) -> u16 {
            4
        }

        fn write_buffer_size(&self) -> u16 {
            16
        }

        fn is_initialized(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_transfers_pass_through_unchanged() {
        let inner = Arc::new(EchoTransport {
            written: Mutex::new(Vec::new()),
        });
        let traced = TraceTransport::wrap(inner.clone(), TraceConfig::default());

        traced.write(&[1, 2, 3]).await.unwrap();
        let data = traced.read().await.unwrap();

        assert_eq!(data, vec![0xAB; 4]);
        assert_eq!(*inner.written.lock().unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(traced.read_buffer_size(), 4);
        assert_eq!(traced.write_buffer_size(), 16);
        assert!(traced.is_initialized());
    }

    #[test]
    fn test_hex_rendering() {
        assert_eq!(to_hex(&[0x00, 0x0F, 0xFF]), "000FFF");
        assert_eq!(to_hex(&[]), "");
    }

    #[tokio::test]
    async fn test_json_format_still_delegates() {
        let inner = Arc::new(EchoTransport {
            written: Mutex::new(Vec::new()),
        });
        let traced = TraceTransport::wrap(
            inner.clone(),
            TraceConfig::default().with_format(TraceFormat::Json),
        );

        traced.write(&[9]).await.unwrap();
        assert_eq!(*inner.written.lock().unwrap(), vec![vec![9]]);
    }
}
