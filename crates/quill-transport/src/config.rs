use std::sync::Arc;
use std::time::Duration;

use crate::errors::TransportError;
use crate::http::HttpTransport;
use crate::ipc::{IpcHost, IpcTransport};
use crate::transport::Transport;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5173";

/// Configuration for the networked adapter.
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Scheme, host and port of the backend, for example
    /// `http://127.0.0.1:5173`.
    pub base_url: String,
    /// Fixed prefix every API path is resolved under.
    pub api_prefix: String,
    /// Path of the event-stream endpoint, relative to `api_prefix`.
    pub stream_path: String,
    /// Timeout for plain requests. Streams are not bounded by it.
    pub timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_prefix: "/api".to_string(),
            stream_path: "/chat/sse".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `QUILL_API_BASE`: backend origin (default `http://127.0.0.1:5173`).
    /// - `QUILL_API_PREFIX`: API prefix (default `/api`).
    /// - `QUILL_HTTP_TIMEOUT_SECS`: plain request timeout in seconds.
    pub fn from_env() -> Result<Self, TransportError> {
        let mut config = match std::env::var("QUILL_API_BASE") {
            Ok(base) if !base.trim().is_empty() => Self::new(base.trim()),
            _ => Self::default(),
        };
        if let Ok(prefix) = std::env::var("QUILL_API_PREFIX") {
            config.api_prefix = prefix.trim().to_string();
        }
        if let Ok(raw) = std::env::var("QUILL_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                TransportError::Config(format!("QUILL_HTTP_TIMEOUT_SECS is not a number: {raw}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Joins base URL, API prefix and a relative path without doubling
    /// slashes.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        let mut url = self.base_url.trim_end_matches('/').to_string();
        if !prefix.is_empty() {
            url.push('/');
            url.push_str(prefix);
        }
        url.push('/');
        url.push_str(path);
        url
    }
}

/// Names used by the embedded IPC backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpcConfig {
    /// Prepended to the five stream channel names (`meta`, `chunk`, `log`,
    /// `error`, `end`).
    pub channel_prefix: String,
    /// Command that begins a stream.
    pub start_command: String,
    /// Command that cancels a stream.
    pub cancel_command: String,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            channel_prefix: "dq:".to_string(),
            start_command: "dq_send_chat_stream".to_string(),
            cancel_command: "dq_cancel_stream".to_string(),
        }
    }
}

impl IpcConfig {
    pub fn channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }

    pub(crate) fn channel(&self, name: &str) -> String {
        format!("{}{}", self.channel_prefix, name)
    }
}

/// Settings for both adapters; only the selected one is used.
#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    pub http: HttpTransportConfig,
    pub ipc: IpcConfig,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, TransportError> {
        Ok(Self {
            http: HttpTransportConfig::from_env()?,
            ipc: IpcConfig::default(),
        })
    }
}

/// Picks the adapter for this process.
///
/// An IPC host is only present when an embedding desktop shell injected one;
/// without it the networked backend is used. This is the only place that
/// probes for the host. Everything else receives the returned transport.
pub fn select_transport(
    host: Option<Arc<dyn IpcHost>>,
    config: BackendConfig,
) -> Result<Arc<dyn Transport>, TransportError> {
    let transport: Arc<dyn Transport> = match host {
        Some(host) => Arc::new(IpcTransport::new(host, config.ipc)),
        None => Arc::new(HttpTransport::new(config.http)?),
    };
    tracing::info!(backend = %transport.kind(), "selected chat transport");
    Ok(transport)
}
