/// Severity attached to `StreamEvent::Log`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational marker produced by the transport itself (for example a
    /// peer-closed connection).
    Info,
    /// A payload could not be decoded.
    Error,
    /// Verbose log line forwarded from the backend.
    Log,
}

/// Normalized events yielded by every `EventStream`, whichever backend
/// produced them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// The backend bound the exchange to a chat.
    Meta { chat_id: i64 },
    /// Incremental reply text.
    Chunk { text: String },
    /// Diagnostic line; never terminal.
    Log { level: LogLevel, message: String },
    /// The backend reported a failure mid-stream. Partial output received
    /// before it is left to the caller.
    Error { message: String },
}

impl StreamEvent {
    pub fn meta(chat_id: i64) -> Self {
        Self::Meta { chat_id }
    }

    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns true for `StreamEvent::Error`.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_lowercase_type_tag() {
        let value = serde_json::to_value(StreamEvent::log(LogLevel::Info, "closed")).expect("ser");
        assert_eq!(
            value,
            serde_json::json!({"type":"log","level":"info","message":"closed"})
        );
    }

    #[test]
    fn only_error_kind_reports_is_error() {
        assert!(StreamEvent::error("boom").is_error());
        assert!(!StreamEvent::log(LogLevel::Error, "bad frame").is_error());
        assert!(!StreamEvent::chunk("hi").is_error());
    }
}
