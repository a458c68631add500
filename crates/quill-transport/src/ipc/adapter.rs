use std::sync::Arc;

use tracing::{debug, error, warn};

use super::host::{EventHandler, IpcHost};
use super::routes;
use crate::bridge::{EventSink, StreamHandle, bridge};
use crate::config::IpcConfig;
use crate::errors::TransportError;
use crate::model::{BackendKind, RequestSpec, StreamId, StreamSpec};
use crate::stream::{LogLevel, StreamEvent};
use crate::transport::Transport;

/// The five channels a stream subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Channel {
    Meta,
    Chunk,
    Log,
    Error,
    End,
}

const CHANNELS: [Channel; 5] = [
    Channel::Meta,
    Channel::Chunk,
    Channel::Log,
    Channel::Error,
    Channel::End,
];

impl Channel {
    fn name(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Chunk => "chunk",
            Self::Log => "log",
            Self::Error => "error",
            Self::End => "end",
        }
    }
}

#[derive(serde::Deserialize)]
struct Envelope {
    #[serde(rename = "streamId", alias = "stream_id")]
    stream_id: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct MetaData {
    chat_id: i64,
}

enum Delivery {
    Event(StreamEvent),
    End,
}

fn text_of(data: serde_json::Value) -> String {
    match data {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

fn map_delivery(channel: Channel, data: serde_json::Value) -> Delivery {
    match channel {
        Channel::Meta => Delivery::Event(match serde_json::from_value::<MetaData>(data) {
            Ok(meta) => StreamEvent::meta(meta.chat_id),
            Err(e) => StreamEvent::log(LogLevel::Error, format!("invalid meta payload: {e}")),
        }),
        Channel::Chunk => Delivery::Event(match data {
            serde_json::Value::String(text) => StreamEvent::chunk(text),
            other => StreamEvent::log(
                LogLevel::Error,
                format!("invalid chunk payload: {other}"),
            ),
        }),
        Channel::Log => Delivery::Event(StreamEvent::log(LogLevel::Log, text_of(data))),
        Channel::Error => Delivery::Event(StreamEvent::error(text_of(data))),
        Channel::End => Delivery::End,
    }
}

/// Builds the listener for one channel of stream `id`. Payloads for other
/// streams are ignored without touching the queue.
fn channel_handler(channel: Channel, id: StreamId, sink: EventSink) -> EventHandler {
    Arc::new(move |raw: serde_json::Value| {
        let envelope: Envelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(channel = channel.name(), error = %e, "dropping unattributable ipc payload");
                return;
            }
        };
        if !id.matches(&envelope.stream_id) {
            return;
        }
        match map_delivery(channel, envelope.data) {
            Delivery::Event(event) => {
                sink.push(event);
            }
            Delivery::End => {
                debug!(stream_id = %id, "ipc stream ended");
                sink.end();
            }
        }
    })
}

fn start_args(id: StreamId, spec: &StreamSpec) -> serde_json::Value {
    let mut args = serde_json::Map::new();
    args.insert("streamId".into(), id.to_string().into());
    args.insert("prompt".into(), spec.prompt.clone().into());
    let optional = [
        ("chatId", spec.chat_id.map(serde_json::Value::from)),
        ("providerId", spec.provider_id.map(serde_json::Value::from)),
        ("regenMessageId", spec.regen_message_id.map(serde_json::Value::from)),
        ("stream", spec.stream.map(serde_json::Value::from)),
        ("debug", spec.debug.map(serde_json::Value::from)),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            args.insert(key.into(), value);
        }
    }
    serde_json::Value::Object(args)
}

/// `Transport` backed by an embedded desktop shell.
pub struct IpcTransport {
    host: Arc<dyn IpcHost>,
    config: IpcConfig,
}

impl IpcTransport {
    pub fn new(host: Arc<dyn IpcHost>, config: IpcConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Transport for IpcTransport {
    fn kind(&self) -> BackendKind {
        BackendKind::Ipc
    }

    async fn request_value(&self, spec: RequestSpec) -> Result<serde_json::Value, TransportError> {
        let routed = routes::resolve(&spec).inspect_err(|e| {
            error!(error = %e, "no ipc command for request");
        })?;
        debug!(command = routed.command, method = %spec.method, path = %spec.path, "ipc request");
        self.host
            .invoke(routed.command, routed.args)
            .await
            .map_err(|e| TransportError::command(routed.command, e.0))
    }

    fn stream(&self, spec: StreamSpec) -> StreamHandle {
        let (sink, handle) = bridge();
        let id = StreamId::new();
        debug!(stream_id = %id, chat_id = ?spec.chat_id, "starting ipc stream");
        tokio::spawn(start_stream(
            self.host.clone(),
            self.config.clone(),
            id,
            spec,
            sink,
        ));
        handle
    }
}

/// Subscribes the five channels, then asks the host to begin streaming.
async fn start_stream(
    host: Arc<dyn IpcHost>,
    config: IpcConfig,
    id: StreamId,
    spec: StreamSpec,
    sink: EventSink,
) {
    for channel in CHANNELS {
        let name = config.channel(channel.name());
        match host
            .listen(&name, channel_handler(channel, id, sink.clone()))
            .await
        {
            Ok(listener) => {
                let host = host.clone();
                sink.on_cleanup(move || host.unlisten(listener));
            }
            Err(e) => {
                warn!(stream_id = %id, channel = %name, error = %e, "ipc subscription failed");
                sink.push(StreamEvent::error(format!("subscribing to {name} failed: {e}")));
                sink.end();
                return;
            }
        }
    }

    if sink.is_ended() {
        debug!(stream_id = %id, "ipc stream cancelled before start");
        return;
    }

    let started = host
        .invoke(&config.start_command, start_args(id, &spec))
        .await;
    match started {
        Ok(_) => {
            // Registered only once the remote side knows the id; a cancel that
            // raced the start command fires here, exactly once.
            let runtime = tokio::runtime::Handle::current();
            let command = config.cancel_command.clone();
            sink.on_cancel(move || {
                runtime.spawn(cancel_remote(host, command, id));
            });
        }
        Err(e) => {
            warn!(stream_id = %id, error = %e, "ipc stream start failed");
            sink.push(StreamEvent::error(format!(
                "{} failed: {e}",
                config.start_command
            )));
            sink.end();
        }
    }
}

async fn cancel_remote(host: Arc<dyn IpcHost>, command: String, id: StreamId) {
    let args = serde_json::json!({ "streamId": id.to_string() });
    match host.invoke(&command, args).await {
        Ok(_) => debug!(stream_id = %id, "ipc stream cancel delivered"),
        Err(e) => warn!(stream_id = %id, error = %e, "ipc stream cancel failed"),
    }
}
