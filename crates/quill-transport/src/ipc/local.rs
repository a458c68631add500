use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use super::host::{EventHandler, HostError, IpcHost, ListenerId};

type CommandFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, HostError>> + Send>>;
type CommandHandler = Arc<dyn Fn(serde_json::Value) -> CommandFuture + Send + Sync>;

#[derive(Default)]
struct Inner {
    commands: DashMap<String, CommandHandler>,
    listeners: DashMap<ListenerId, (String, EventHandler)>,
    next_listener: AtomicU64,
}

/// In-process `IpcHost`.
///
/// Commands dispatch to registered async handlers; events emitted on a
/// channel reach every listener of that channel synchronously. Clones share
/// state, so a command handler can hold a clone and emit stream events from a
/// spawned task the way a desktop shell would.
#[derive(Clone, Default)]
pub struct LocalIpcHost {
    inner: Arc<Inner>,
}

impl LocalIpcHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handler for `name`.
    pub fn register_command<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, HostError>> + Send + 'static,
    {
        let handler: CommandHandler =
            Arc::new(move |args: serde_json::Value| -> CommandFuture { Box::pin(handler(args)) });
        self.inner.commands.insert(name.into(), handler);
    }

    /// Delivers `payload` to every listener of `channel`; returns how many
    /// were invoked.
    pub fn emit(&self, channel: &str, payload: serde_json::Value) -> usize {
        // Handlers run outside the map guards so they may unlisten.
        let handlers: Vec<EventHandler> = self
            .inner
            .listeners
            .iter()
            .filter(|entry| entry.value().0 == channel)
            .map(|entry| entry.value().1.clone())
            .collect();
        for handler in &handlers {
            handler(payload.clone());
        }
        handlers.len()
    }

    /// Emits the `{streamId, data}` envelope used by stream channels.
    pub fn emit_stream(&self, channel: &str, stream_id: &str, data: serde_json::Value) -> usize {
        self.emit(
            channel,
            serde_json::json!({ "streamId": stream_id, "data": data }),
        )
    }

    /// Number of active listeners, optionally restricted to one channel.
    pub fn listener_count(&self, channel: Option<&str>) -> usize {
        match channel {
            None => self.inner.listeners.len(),
            Some(channel) => self
                .inner
                .listeners
                .iter()
                .filter(|entry| entry.value().0 == channel)
                .count(),
        }
    }
}

#[async_trait::async_trait]
impl IpcHost for LocalIpcHost {
    async fn invoke(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, HostError> {
        let handler = self
            .inner
            .commands
            .get(command)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HostError(format!("unknown command {command}")))?;
        debug!(command, "local ipc invoke");
        handler(args).await
    }

    async fn listen(&self, channel: &str, handler: EventHandler) -> Result<ListenerId, HostError> {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .insert(id, (channel.to_string(), handler));
        Ok(id)
    }

    fn unlisten(&self, id: ListenerId) {
        self.inner.listeners.remove(&id);
    }
}
