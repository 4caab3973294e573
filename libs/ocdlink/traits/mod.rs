//! # ocdlink traits
//!
//! Seams between the connection worker and the host application:
//!
//! - **Dispatcher**: where notification callbacks run
//! - **ReconnectPolicy**: how long to wait between connection attempts
//! - **OcdError**: the error type shared by every module

pub mod dispatch;
pub mod error;
pub mod reconnect;

pub use dispatch::{Dispatcher, InlineDispatcher, Job, ThreadDispatcher};
pub use error::{OcdError, Result};
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectPolicy};
