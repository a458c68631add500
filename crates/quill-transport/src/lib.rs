//! Client-side transport for a chat backend that is reachable either over
//! HTTP with server-sent events or through an embedding desktop shell's IPC
//! bridge.
//!
//! Callers pick an adapter once with [`select_transport`] and then talk to an
//! `Arc<dyn Transport>`: plain round trips through [`TransportExt::request`],
//! streamed replies through [`Transport::stream`], which yields a
//! [`StreamHandle`] of normalized [`StreamEvent`]s regardless of backend.
//!
//! The crate emits `tracing` events (stream ids, commands, paths) and leaves
//! installing a subscriber to the application.
//!
//! # Streaming a reply
//!
//! ```no_run
//! use quill_transport::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), TransportError> {
//! let transport = select_transport(None, BackendConfig::from_env()?)?;
//! let api = ChatApi::new(transport);
//!
//! let mut handle = api.send_stream(StreamSpec::new("Say hello"))?;
//! while let Some(event) = handle.next_event().await {
//!     match event {
//!         StreamEvent::Meta { chat_id } => println!("chat {chat_id}"),
//!         StreamEvent::Chunk { text } => print!("{text}"),
//!         StreamEvent::Error { message } => eprintln!("error: {message}"),
//!         StreamEvent::Log { .. } => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Typed calls for every backend route.
pub mod api;
/// Push-to-pull event queue with once-only cancel and cleanup actions.
pub mod bridge;
/// Adapter configuration and backend selection.
pub mod config;
/// Error type shared by all adapters.
pub mod errors;
pub mod http;
pub mod ipc;
/// Request and stream descriptions.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
mod sse;
/// Normalized stream events.
pub mod stream;
/// The `Transport` contract.
pub mod transport;

pub use api::{
    BranchRequest, BranchResult, ChatApi, ChatMessages, ChatReply, ChatSummary, HealthPreview,
    HealthReport, ProviderInput, ProviderRecord, ProvidersState, StoredMessage, collect_reply,
};
pub use bridge::{CancelHandle, EventSink, EventStream, StreamHandle, bridge};
pub use config::{BackendConfig, HttpTransportConfig, IpcConfig, select_transport};
pub use errors::TransportError;
pub use http::HttpTransport;
pub use ipc::{EventHandler, HostError, IpcHost, IpcTransport, ListenerId, LocalIpcHost};
pub use model::{BackendKind, Method, QueryValue, RequestSpec, StreamId, StreamSpec};
pub use stream::{LogLevel, StreamEvent};
pub use transport::{Transport, TransportExt};
