//! Embedded IPC adapter.
//!
//! Plain requests go through the fixed route table in [`routes`]; streams
//! subscribe to five shared event channels and keep only payloads tagged with
//! their own `StreamId`.
mod adapter;
mod host;
mod local;
pub mod routes;

pub use adapter::IpcTransport;
pub use host::{EventHandler, HostError, IpcHost, ListenerId};
pub use local::LocalIpcHost;
