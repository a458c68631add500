use serde::de::DeserializeOwned;

use crate::bridge::StreamHandle;
use crate::errors::TransportError;
use crate::model::{BackendKind, RequestSpec, StreamSpec};

/// Capability shared by every backend adapter.
///
/// Callers hold an `Arc<dyn Transport>` and never learn which backend is
/// active.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Backend implemented by this adapter.
    fn kind(&self) -> BackendKind;

    /// Performs one non-streaming round trip and returns the decoded JSON
    /// body.
    async fn request_value(&self, spec: RequestSpec) -> Result<serde_json::Value, TransportError>;

    /// Starts a streaming exchange.
    ///
    /// Returns immediately; connection or subscription setup runs on a
    /// spawned task, so this must be called from within a tokio runtime.
    /// Failures during setup arrive in-band as `StreamEvent::Error`.
    fn stream(&self, spec: StreamSpec) -> StreamHandle;
}

/// Typed helpers available on every `Transport`.
#[async_trait::async_trait]
pub trait TransportExt: Transport {
    /// Performs a request and decodes the body as `T`.
    ///
    /// A body that does not match `T` is a `TransportError::Parse`; no
    /// defaults are substituted.
    async fn request<T>(&self, spec: RequestSpec) -> Result<T, TransportError>
    where
        T: DeserializeOwned + Send,
    {
        let path = spec.path.clone();
        let value = self.request_value(spec).await?;
        serde_json::from_value(value)
            .map_err(|e| TransportError::parse(format!("unexpected response for {path}: {e}")))
    }

    /// Performs a request, decodes the body as `T`, then applies `transform`.
    async fn request_with<T, U, F>(&self, spec: RequestSpec, transform: F) -> Result<U, TransportError>
    where
        T: DeserializeOwned + Send,
        U: Send,
        F: FnOnce(T) -> U + Send,
    {
        let decoded: T = self.request(spec).await?;
        Ok(transform(decoded))
    }
}

impl<T: Transport + ?Sized> TransportExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::bridge;
    use std::sync::Arc;

    struct Fixed(serde_json::Value);

    #[async_trait::async_trait]
    impl Transport for Fixed {
        fn kind(&self) -> BackendKind {
            BackendKind::Http
        }

        async fn request_value(
            &self,
            _spec: RequestSpec,
        ) -> Result<serde_json::Value, TransportError> {
            Ok(self.0.clone())
        }

        fn stream(&self, _spec: StreamSpec) -> StreamHandle {
            let (sink, handle) = bridge();
            sink.end();
            handle
        }
    }

    #[derive(Debug, serde::Deserialize)]
    struct Named {
        name: String,
    }

    #[tokio::test]
    async fn request_decodes_and_transforms_through_dyn_transport() {
        let transport: Arc<dyn Transport> = Arc::new(Fixed(serde_json::json!({"name":"quill"})));
        let name = transport
            .request_with(RequestSpec::get("/x"), |n: Named| n.name.len())
            .await
            .expect("request");
        assert_eq!(name, 5);
    }

    #[tokio::test]
    async fn structurally_invalid_body_is_a_parse_error() {
        let transport = Fixed(serde_json::json!({"other": 1}));
        let err = transport
            .request::<Named>(RequestSpec::get("/x"))
            .await
            .expect_err("shape mismatch");
        assert!(matches!(err, TransportError::Parse(msg) if msg.contains("/x")));
    }
}
