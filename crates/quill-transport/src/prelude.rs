//! Re-exports the types most callers need in one import.
pub use crate::{
    BackendConfig, CancelHandle, ChatApi, ChatReply, LogLevel, RequestSpec, StreamEvent,
    StreamHandle, StreamSpec, Transport, TransportError, TransportExt, select_transport,
};
