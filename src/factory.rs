//! Device factories - discovery, support checking and construction

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::device::Device;
use crate::error::DeviceError;
use crate::types::ConnectedDeviceDefinition;

/// Injected enumeration behavior
pub type EnumerateDevices = Box<
    dyn Fn(CancellationToken) -> BoxFuture<'static, Result<Vec<ConnectedDeviceDefinition>, DeviceError>>
        + Send
        + Sync,
>;

/// Injected support predicate
pub type SupportsDevice = Box<
    dyn Fn(ConnectedDeviceDefinition, CancellationToken) -> BoxFuture<'static, Result<bool, DeviceError>>
        + Send
        + Sync,
>;

/// Injected construction behavior
pub type ConstructDevice = Box<
    dyn Fn(ConnectedDeviceDefinition, CancellationToken) -> BoxFuture<'static, Result<Device, DeviceError>>
        + Send
        + Sync,
>;

/// Discovery and construction behind one polymorphic interface
///
/// A factory is a stateless policy bundle: it holds no device state and never
/// retries. Enumeration and construction failures propagate to the caller
/// unmodified.
#[async_trait]
pub trait DeviceFactory: Send + Sync {
    /// Definitions of the currently connected devices, in enumeration order
    async fn connected_definitions(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<ConnectedDeviceDefinition>, DeviceError>;

    /// Whether this factory can construct a device for the definition
    async fn supports_device(
        &self,
        definition: &ConnectedDeviceDefinition,
        cancel: CancellationToken,
    ) -> Result<bool, DeviceError>;

    /// Construct a live device for a definition
    ///
    /// An absent definition is an argument error, surfaced before the
    /// construction behavior is consulted.
    async fn open_device(
        &self,
        definition: Option<&ConnectedDeviceDefinition>,
        cancel: CancellationToken,
    ) -> Result<Device, DeviceError>;
}

/// A factory assembled from three injected behaviors
///
/// The behaviors are pure with respect to the factory's own state; platform
/// side effects live inside them. Constructed once per device category and
/// immutable afterwards.
pub struct ComposedDeviceFactory {
    enumerate: EnumerateDevices,
    construct: ConstructDevice,
    supports: SupportsDevice,
}

impl ComposedDeviceFactory {
    /// Compose a factory from enumeration, construction and support behaviors
    pub fn new(
        enumerate: EnumerateDevices,
        construct: ConstructDevice,
        supports: SupportsDevice,
    ) -> Self {
        Self {
            enumerate,
            construct,
            supports,
        }
    }
}

#[async_trait]
impl DeviceFactory for ComposedDeviceFactory {
    async fn connected_definitions(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<ConnectedDeviceDefinition>, DeviceError> {
        (self.enumerate)(cancel).await
    }

    async fn supports_device(
        &self,
        definition: &ConnectedDeviceDefinition,
        cancel: CancellationToken,
    ) -> Result<bool, DeviceError> {
        (self.supports)(definition.clone(), cancel).await
    }

    async fn open_device(
        &self,
        definition: Option<&ConnectedDeviceDefinition>,
        cancel: CancellationToken,
    ) -> Result<Device, DeviceError> {
        let definition = definition.ok_or(DeviceError::MissingDefinition)?;
        (self.construct)(definition.clone(), cancel).await
    }
}

/// A heterogeneous pool of factories answering as one
///
/// Higher-level selection logic uses this to match one physical device
/// against several backends: enumeration concatenates every factory's
/// definitions, and construction routes to the first factory that supports
/// the definition.
pub struct AggregateDeviceFactory {
    factories: Vec<Arc<dyn DeviceFactory>>,
}

impl AggregateDeviceFactory {
    /// Pool a set of factories
    pub fn new(factories: Vec<Arc<dyn DeviceFactory>>) -> Self {
        Self { factories }
    }
}

#[async_trait]
impl DeviceFactory for AggregateDeviceFactory {
    async fn connected_definitions(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<ConnectedDeviceDefinition>, DeviceError> {
        let mut definitions = Vec::new();
        for factory in &self.factories {
            definitions.extend(factory.connected_definitions(cancel.clone()).await?);
        }
        Ok(definitions)
    }

    async fn supports_device(
        &self,
        definition: &ConnectedDeviceDefinition,
        cancel: CancellationToken,
    ) -> Result<bool, DeviceError> {
        for factory in &self.factories {
            if factory.supports_device(definition, cancel.clone()).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn open_device(
        &self,
        definition: Option<&ConnectedDeviceDefinition>,
        cancel: CancellationToken,
    ) -> Result<Device, DeviceError> {
        let definition = definition.ok_or(DeviceError::MissingDefinition)?;
        for factory in &self.factories {
            if factory
                .supports_device(definition, cancel.clone())
                .await?
            {
                return factory.open_device(Some(definition), cancel).await;
            }
        }
        debug!(device_id = %definition.device_id, "no factory supports definition");
        Err(DeviceError::DeviceNotFound(definition.device_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceKind;
    use crate::Transport;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubTransport;

    #[async_trait]
    impl Transport for StubTransport {
        async fn read(&self) -> Result<Vec<u8>, DeviceError> {
            Ok(vec![0u8; 8])
        }

        async fn write(&self, _data: &[u8]) -> Result<(), DeviceError> {
            Ok(())
        }

        fn read_buffer_size(&self) -> u16 {
            8
        }

        fn write_buffer_size(&self) -> u16 {
            8
        }

        fn is_initialized(&self) -> bool {
            true
        }
    }

    fn definition(id: &str) -> ConnectedDeviceDefinition {
        ConnectedDeviceDefinition::new(id, DeviceKind::Hid)
    }

    fn composed(
        definitions: Vec<ConnectedDeviceDefinition>,
        supported_id: &'static str,
        construct_calls: Arc<AtomicUsize>,
    ) -> ComposedDeviceFactory {
        ComposedDeviceFactory::new(
            Box::new(move |_cancel| {
                let definitions = definitions.clone();
                Box::pin(async move { Ok(definitions) })
            }),
            Box::new(move |definition, _cancel| {
                construct_calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { Ok(Device::new(definition, Arc::new(StubTransport))) })
            }),
            Box::new(move |definition, _cancel| {
                Box::pin(async move { Ok(definition.device_id == supported_id) })
            }),
        )
    }

    #[tokio::test]
    async fn test_enumeration_delegates_to_behavior() {
        let factory = composed(
            vec![definition("a"), definition("b")],
            "a",
            Arc::new(AtomicUsize::new(0)),
        );
        let definitions = factory
            .connected_definitions(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].device_id, "a");
        assert_eq!(definitions[1].device_id, "b");
    }

    #[tokio::test]
    async fn test_open_device_without_definition_is_an_argument_error() {
        let construct_calls = Arc::new(AtomicUsize::new(0));
        let factory = composed(vec![], "a", construct_calls.clone());

        let err = factory
            .open_device(None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::MissingDefinition));
        // The construction behavior was never consulted.
        assert_eq!(construct_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_device_binds_the_given_definition() {
        let factory = composed(vec![], "a", Arc::new(AtomicUsize::new(0)));
        let definition = definition("a");
        let device = factory
            .open_device(Some(&definition), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(device.definition(), &definition);
        assert_eq!(device.device_id(), "a");
    }

    #[tokio::test]
    async fn test_construction_errors_propagate_unmodified() {
        let factory = ComposedDeviceFactory::new(
            Box::new(|_cancel| Box::pin(async { Ok(Vec::new()) })),
            Box::new(|_definition, _cancel| {
                Box::pin(async { Err(DeviceError::Construction("device busy".into())) })
            }),
            Box::new(|_definition, _cancel| Box::pin(async { Ok(true) })),
        );

        let err = factory
            .open_device(Some(&definition("a")), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Construction(_)));
    }

    #[tokio::test]
    async fn test_aggregate_routes_to_supporting_factory() {
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let pool = AggregateDeviceFactory::new(vec![
            Arc::new(composed(vec![definition("a")], "a", a_calls.clone())),
            Arc::new(composed(vec![definition("b")], "b", b_calls.clone())),
        ]);

        let definitions = pool
            .connected_definitions(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(definitions.len(), 2);

        let target = definition("b");
        assert!(pool
            .supports_device(&target, CancellationToken::new())
            .await
            .unwrap());

        let device = pool
            .open_device(Some(&target), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(device.device_id(), "b");
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_aggregate_reports_unsupported_definition() {
        let pool = AggregateDeviceFactory::new(vec![Arc::new(composed(
            vec![],
            "a",
            Arc::new(AtomicUsize::new(0)),
        ))]);

        let err = pool
            .open_device(Some(&definition("zzz")), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancellation_reaches_the_enumeration_behavior() {
        let observed = Arc::new(AtomicBool::new(false));
        let observed_in_behavior = observed.clone();
        let factory = ComposedDeviceFactory::new(
            Box::new(move |cancel| {
                let observed = observed_in_behavior.clone();
                Box::pin(async move {
                    if cancel.is_cancelled() {
                        observed.store(true, Ordering::SeqCst);
                        return Err(DeviceError::Cancelled);
                    }
                    Ok(Vec::new())
                })
            }),
            Box::new(|_definition, _cancel| {
                Box::pin(async { Err(DeviceError::Construction("unused".into())) })
            }),
            Box::new(|_definition, _cancel| Box::pin(async { Ok(false) })),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = factory.connected_definitions(cancel).await.unwrap_err();
        assert!(matches!(err, DeviceError::Cancelled));
        assert!(observed.load(Ordering::SeqCst));
    }
}
