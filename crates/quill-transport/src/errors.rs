use crate::model::Method;

/// Errors returned by plain requests and adapter construction.
///
/// Streams never return this type directly; their failures arrive in-band as
/// `StreamEvent::Error` or `StreamEvent::Log` events. `Stream` carries such an
/// error once a reply has been collected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The HTTP backend answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    /// The IPC host reported that a command failed.
    #[error("command {command} failed: {message}")]
    Command { command: String, message: String },
    /// The request could not be sent or its response could not be read.
    #[error("network error: {0}")]
    Network(String),
    /// The response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
    /// No IPC command is mapped to this verb and path.
    #[error("unsupported route: {method} {path}")]
    UnsupportedRoute { method: Method, path: String },
    /// Invalid adapter configuration.
    #[error("config error: {0}")]
    Config(String),
    /// A stream delivered an in-band `StreamEvent::Error`.
    #[error("stream failed: {0}")]
    Stream(String),
    /// Caller input rejected before any round trip.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    pub(crate) fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns the HTTP status for `Status` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}
