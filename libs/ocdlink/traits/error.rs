use std::time::Duration;
use thiserror::Error;

/// Main error type for ocdlink
///
/// Transport faults never reach callers directly: the worker turns them
/// into state transitions and fails whatever command was pending with
/// [`OcdError::ConnectionLost`].
#[derive(Error, Debug)]
pub enum OcdError {
    /// The connection dropped while the command was queued or in flight
    #[error("Connection lost before a response was received")]
    ConnectionLost,

    /// The command deadline passed before a response arrived
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// A frame grew past the configured limit without a terminator
    #[error("Frame exceeds maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// Response did not have the expected shape
    #[error("Malformed reply: {0:?}")]
    MalformedReply(String),

    /// Response value could not be parsed as a number
    #[error("Invalid value {value:?}: {source}")]
    InvalidValue {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A block read would run past the end of the 32-bit address space
    #[error("Reading {words} words at 0x{address:08X} overflows the address space")]
    AddressOverflow { address: u32, words: usize },

    /// A command was issued before `start()`
    #[error("Client has not been started")]
    NotStarted,

    /// The client was shut down
    #[error("Client is shut down")]
    ShutDown,

    /// Worker thread or runtime could not be created
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// Socket I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcdError {
    /// Whether the error came from the transport rather than the reply
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            OcdError::ConnectionLost | OcdError::Io(_) | OcdError::FrameTooLarge { .. }
        )
    }
}

/// Result type for ocdlink operations
pub type Result<T> = std::result::Result<T, OcdError>;
