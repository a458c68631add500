//! Networked adapter: JSON request/response calls plus one server-sent-event
//! connection per stream.

use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::bridge::{EventSink, StreamHandle, bridge};
use crate::config::HttpTransportConfig;
use crate::errors::TransportError;
use crate::model::{BackendKind, Method, RequestSpec, StreamSpec};
use crate::sse::{FrameAction, SseDecoder, closed_event, map_frame};
use crate::stream::StreamEvent;
use crate::transport::Transport;

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// `Transport` backed by an HTTP server.
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Creates an adapter from explicit configuration.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        reqwest::Url::parse(&config.base_url).map_err(|e| {
            TransportError::Config(format!("invalid base url {}: {e}", config.base_url))
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates an adapter using `HttpTransportConfig::from_env`.
    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(HttpTransportConfig::from_env()?)
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    pub(crate) fn request_url(&self, spec: &RequestSpec) -> Result<String, TransportError> {
        if spec.path.contains('?') {
            return Err(TransportError::Invalid(format!(
                "path must not carry a query string: {}",
                spec.path
            )));
        }
        let pairs = spec
            .present_query()
            .map(|(key, value)| (key.to_string(), value.render()));
        Ok(with_query(self.config.endpoint(&spec.path), pairs))
    }

    pub(crate) fn stream_url(&self, spec: &StreamSpec) -> String {
        let mut pairs = vec![("prompt".to_string(), spec.prompt.clone())];
        let ids = [
            ("chat_id", spec.chat_id),
            ("provider_id", spec.provider_id),
            ("regen_message_id", spec.regen_message_id),
        ];
        for (key, value) in ids {
            if let Some(value) = value {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
        if !spec.is_incremental() {
            pairs.push(("stream".to_string(), "false".to_string()));
        }
        if spec.is_debug() {
            pairs.push(("debug".to_string(), "true".to_string()));
        }
        with_query(self.config.endpoint(&self.config.stream_path), pairs)
    }
}

fn with_query(mut url: String, pairs: impl IntoIterator<Item = (String, String)>) -> String {
    let mut sep = '?';
    for (key, value) in pairs {
        url.push(sep);
        url.push_str(&urlencoding::encode(&key));
        url.push('=');
        url.push_str(&urlencoding::encode(&value));
        sep = '&';
    }
    url
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    async fn request_value(&self, spec: RequestSpec) -> Result<serde_json::Value, TransportError> {
        let url = self.request_url(&spec)?;
        debug!(method = %spec.method, path = %spec.path, "http request");

        let mut http_req = self
            .client
            .request(http_method(spec.method), &url)
            .timeout(self.config.timeout);
        if let Some(body) = &spec.body {
            http_req = http_req.json(body);
        }

        let response = http_req.send().await.map_err(|e| {
            TransportError::Network(format!("{} {} failed: {e}", spec.method, spec.path))
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            TransportError::Network(format!("reading {} {} failed: {e}", spec.method, spec.path))
        })?;
        if !status.is_success() {
            return Err(TransportError::status(status.as_u16(), text));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            TransportError::parse(format!("invalid JSON from {} {}: {e}", spec.method, spec.path))
        })
    }

    fn stream(&self, spec: StreamSpec) -> StreamHandle {
        let (sink, handle) = bridge();
        let url = self.stream_url(&spec);
        debug!(chat_id = ?spec.chat_id, incremental = spec.is_incremental(), "opening event stream");

        spawn_pump(&sink, pump_events(self.client.clone(), url, sink.clone()));
        handle
    }
}

/// Runs `pump` on its own task; cancelling or finishing the stream aborts it.
fn spawn_pump<F>(sink: &EventSink, pump: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let abort = tokio::spawn(pump).abort_handle();
    sink.on_cancel({
        let abort = abort.clone();
        move || abort.abort()
    });
    sink.on_cleanup(move || abort.abort());
}

/// Reads one event-stream connection into `sink` until the peer closes it,
/// an error frame arrives, or the stream is cancelled.
async fn pump_events(client: reqwest::Client, url: String, sink: EventSink) {
    let response = match client
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            sink.push(StreamEvent::error(format!("stream request failed: {e}")));
            sink.end();
            return;
        }
    };
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        sink.push(StreamEvent::error(format!(
            "stream request failed with status {status}: {body}"
        )));
        sink.end();
        return;
    }

    let body: ByteStream = Box::pin(response.bytes_stream());
    read_frames(body, &sink).await;
}

async fn read_frames(mut body: ByteStream, sink: &EventSink) {
    let mut decoder = SseDecoder::default();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "event stream read failed");
                break;
            }
        };
        for frame in decoder.push_chunk(&chunk) {
            match map_frame(&frame) {
                FrameAction::Emit(event) => {
                    if !sink.push(event) {
                        return;
                    }
                }
                FrameAction::Close(event) => {
                    sink.push(event);
                    sink.end();
                    return;
                }
                FrameAction::Ignore => {
                    debug!(event = ?frame.event, "ignoring unknown event frame");
                }
            }
        }
    }
    sink.push(closed_event());
    sink.end();
}
