//! # ocdlink
//!
//! Client for the OpenOCD Tcl RPC interface (port 6666).
//!
//! ## Features
//!
//! - **Single socket owner**: one worker thread does all network I/O
//! - **Ordered commands**: callers on any thread, strict FIFO, one in flight
//! - **Notification demux**: `#EVENT`, `#STATE` and `#RESET` frames become typed callbacks
//! - **Automatic reconnect**: pluggable [`ReconnectPolicy`], commands carry deadlines
//! - **Type-state builder**: a dispatcher must be chosen before `build()`

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, client, codec, config, connection_state, memory, notification, publisher, queue,
    builder::{states, ClientBuilder},
    client::OcdClient,
    codec::FrameReader,
    config::ClientConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    notification::{
        classify, Frame, Notification, NotificationKind, TargetEvent, TargetResetMode, TargetState,
    },
    publisher::{ClientEvent, EventPublisher},
    queue::{CommandHandle, CommandQueue},
};

pub(crate) use self::core::worker;

/// Create a new client builder
pub fn builder() -> ClientBuilder<states::NoDispatcher> {
    ClientBuilder::new()
}
