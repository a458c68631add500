//! Typed calls for every backend route, independent of the active transport.

use std::sync::Arc;

use crate::bridge::StreamHandle;
use crate::errors::TransportError;
use crate::model::{RequestSpec, StreamSpec};
use crate::stream::StreamEvent;
use crate::transport::{Transport, TransportExt as _};

/// A configured model provider as reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProviderRecord {
    pub id: i64,
    pub name: String,
    /// Provider type, for example `openai`.
    pub provider: String,
    pub api_base: String,
    /// Empty when the key lives in secure storage.
    pub api_key: String,
    pub model: String,
    pub is_default: bool,
}

/// Provider list plus global settings; returned by every provider mutation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProvidersState {
    pub providers: Vec<ProviderRecord>,
    pub default_provider_id: Option<i64>,
    pub telemetry_enabled: bool,
}

impl ProvidersState {
    pub fn default_provider(&self) -> Option<&ProviderRecord> {
        let id = self.default_provider_id?;
        self.providers.iter().find(|p| p.id == id)
    }
}

/// Body of provider create/update calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProviderInput {
    pub name: String,
    pub provider: String,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_default: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatSummary {
    pub id: i64,
    pub title: String,
    pub provider_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessages {
    pub chat_id: i64,
    pub provider_id: Option<i64>,
    pub messages: Vec<StoredMessage>,
}

/// Clone a chat, optionally truncated after `until_message_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BranchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until_message_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BranchResult {
    pub chat_id: i64,
    pub title: String,
}

/// Unsaved provider settings to probe.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthPreview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub provider: String,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

/// Result of a provider health probe. `ok: false` is a successful call that
/// reports an unreachable provider.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthReport {
    pub ok: bool,
    pub provider_id: i64,
    pub provider: String,
    pub base: String,
    pub model: String,
    /// Number of models listed when `ok`.
    #[serde(default)]
    pub models: Option<usize>,
    #[serde(default)]
    pub error: Option<String>,
}

// The networked backend wraps lists in an object; the IPC backend returns
// them bare.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ChatList {
    Wrapped { chats: Vec<ChatSummary> },
    Bare(Vec<ChatSummary>),
}

impl ChatList {
    fn into_vec(self) -> Vec<ChatSummary> {
        match self {
            Self::Wrapped { chats } | Self::Bare(chats) => chats,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ModelList {
    Wrapped { models: Vec<String> },
    Bare(Vec<String>),
}

impl ModelList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::Wrapped { models } | Self::Bare(models) => models,
        }
    }
}

/// Everything a stream delivered, folded together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub chat_id: Option<i64>,
    /// Concatenated chunk text.
    pub text: String,
    pub logs: Vec<String>,
    /// Message of the last `Error` event, if any.
    pub error: Option<String>,
}

impl ChatReply {
    /// Returns the text, or the in-band error as `TransportError::Stream`
    /// when the backend reported one.
    pub fn into_text(self) -> Result<String, TransportError> {
        match self.error {
            Some(message) => Err(TransportError::Stream(message)),
            None => Ok(self.text),
        }
    }
}

/// Drains `handle` into a `ChatReply`.
pub async fn collect_reply(mut handle: StreamHandle) -> ChatReply {
    let mut reply = ChatReply::default();
    while let Some(event) = handle.next_event().await {
        match event {
            StreamEvent::Meta { chat_id } => reply.chat_id = Some(chat_id),
            StreamEvent::Chunk { text } => reply.text.push_str(&text),
            StreamEvent::Log { message, .. } => reply.logs.push(message),
            StreamEvent::Error { message } => reply.error = Some(message),
        }
    }
    reply
}

/// Typed facade over the active transport.
#[derive(Clone)]
pub struct ChatApi {
    transport: Arc<dyn Transport>,
}

impl ChatApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn providers(&self) -> Result<ProvidersState, TransportError> {
        self.transport.request(RequestSpec::get("/providers")).await
    }

    pub async fn create_provider(
        &self,
        input: &ProviderInput,
    ) -> Result<ProvidersState, TransportError> {
        let spec = RequestSpec::post("/providers").json(input)?;
        self.transport.request(spec).await
    }

    pub async fn update_provider(
        &self,
        id: i64,
        input: &ProviderInput,
    ) -> Result<ProvidersState, TransportError> {
        let spec = RequestSpec::put(format!("/providers/{id}")).json(input)?;
        self.transport.request(spec).await
    }

    pub async fn delete_provider(&self, id: i64) -> Result<ProvidersState, TransportError> {
        self.transport
            .request(RequestSpec::delete(format!("/providers/{id}")))
            .await
    }

    pub async fn select_provider(&self, id: i64) -> Result<ProvidersState, TransportError> {
        self.transport
            .request(RequestSpec::post(format!("/providers/{id}/select")))
            .await
    }

    pub async fn list_chats(
        &self,
        provider_id: Option<i64>,
    ) -> Result<Vec<ChatSummary>, TransportError> {
        let spec = RequestSpec::get("/chats").query("provider_id", provider_id);
        self.transport.request_with(spec, ChatList::into_vec).await
    }

    pub async fn chat_messages(&self, chat_id: i64) -> Result<ChatMessages, TransportError> {
        self.transport
            .request(RequestSpec::get(format!("/chats/{chat_id}/messages")))
            .await
    }

    /// Renames a chat. Blank titles are rejected without a round trip.
    pub async fn rename_chat(
        &self,
        chat_id: i64,
        title: &str,
    ) -> Result<ChatSummary, TransportError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TransportError::Invalid("chat title must not be empty".into()));
        }
        let spec = RequestSpec::put(format!("/chats/{chat_id}"))
            .body(serde_json::json!({ "title": title }));
        self.transport.request(spec).await
    }

    /// Deletes a chat and returns the remaining ones.
    pub async fn delete_chat(&self, chat_id: i64) -> Result<Vec<ChatSummary>, TransportError> {
        let spec = RequestSpec::delete(format!("/chats/{chat_id}"));
        self.transport.request_with(spec, ChatList::into_vec).await
    }

    pub async fn branch_chat(
        &self,
        chat_id: i64,
        request: &BranchRequest,
    ) -> Result<BranchResult, TransportError> {
        let spec = RequestSpec::post(format!("/chats/{chat_id}/branch")).json(request)?;
        self.transport.request(spec).await
    }

    pub async fn list_models(&self, provider_id: Option<i64>) -> Result<Vec<String>, TransportError> {
        let spec = RequestSpec::get("/models").query("provider_id", provider_id);
        self.transport.request_with(spec, ModelList::into_vec).await
    }

    pub async fn health(&self, provider_id: Option<i64>) -> Result<HealthReport, TransportError> {
        let spec = RequestSpec::get("/health").query("provider_id", provider_id);
        self.transport.request(spec).await
    }

    pub async fn health_preview(
        &self,
        preview: &HealthPreview,
    ) -> Result<HealthReport, TransportError> {
        let spec = RequestSpec::post("/health/preview").json(preview)?;
        self.transport.request(spec).await
    }

    /// Starts a chat stream after checking the prompt/regenerate rules both
    /// backends enforce.
    pub fn send_stream(&self, spec: StreamSpec) -> Result<StreamHandle, TransportError> {
        let has_prompt = !spec.prompt.trim().is_empty();
        match (spec.regen_message_id, spec.chat_id) {
            (Some(_), _) if has_prompt => {
                return Err(TransportError::Invalid(
                    "prompt and regen_message_id are mutually exclusive".into(),
                ));
            }
            (Some(_), None) => {
                return Err(TransportError::Invalid(
                    "regenerating a message requires a chat id".into(),
                ));
            }
            (None, _) if !has_prompt => {
                return Err(TransportError::Invalid("prompt must not be empty".into()));
            }
            _ => {}
        }
        Ok(self.transport.stream(spec))
    }

    /// Streams a reply and folds it into a `ChatReply`.
    pub async fn send_and_collect(&self, spec: StreamSpec) -> Result<ChatReply, TransportError> {
        let handle = self.send_stream(spec)?;
        Ok(collect_reply(handle).await)
    }
}
