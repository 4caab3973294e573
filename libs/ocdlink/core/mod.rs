//! Client core: wire codec, notification demux, command queue, the
//! connection worker and the public [`OcdClient`] handle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ocdlink::{ExponentialBackoff, OcdClient, ThreadDispatcher};
//!
//! let client = OcdClient::builder()
//!     .host("192.168.1.40")
//!     .reconnect_policy(ExponentialBackoff::new(
//!         Duration::from_millis(100),
//!         Duration::from_secs(5),
//!     ))
//!     .dispatcher(ThreadDispatcher::new("ocd-events")?)
//!     .build();
//!
//! client.on_target_event(|event| println!("event: {event}"));
//! client.start()?;
//! println!("{}", client.issue_command("version")?);
//! ```

pub mod builder;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection_state;
pub mod memory;
pub mod notification;
pub mod publisher;
pub mod queue;
pub(crate) mod worker;

// Re-export main types
pub use builder::{states, ClientBuilder};
pub use client::OcdClient;
pub use codec::{decode_frame, encode_frame, write_frame, FrameReader, FRAME_TERMINATOR};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use notification::{
    classify, EnumTable, Frame, Notification, NotificationKind, TargetEvent, TargetResetMode,
    TargetState,
};
pub use publisher::{ClientEvent, EventPublisher};
pub use queue::{CommandHandle, CommandQueue, PendingCommand};
