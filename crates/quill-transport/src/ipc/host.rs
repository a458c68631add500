use std::sync::Arc;

/// Callback invoked with the raw payload of every event on a channel.
pub type EventHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Identifies one registered listener so it can be released.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub u64);

/// Failure reported by the host, carrying its raw message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl From<String> for HostError {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for HostError {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Command/event bridge exposed by an embedding desktop shell.
///
/// Commands are remote procedures taking a JSON argument object. Events are
/// broadcast on named channels to every listener of that channel.
#[async_trait::async_trait]
pub trait IpcHost: Send + Sync {
    /// Invokes a command and returns its JSON result.
    async fn invoke(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, HostError>;

    /// Subscribes `handler` to `channel`. Returns once the subscription is
    /// active.
    async fn listen(&self, channel: &str, handler: EventHandler) -> Result<ListenerId, HostError>;

    /// Releases a subscription. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId);
}
