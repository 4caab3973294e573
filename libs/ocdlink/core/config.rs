use crate::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::traits::{FixedDelay, ReconnectPolicy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default debug server host
pub const DEFAULT_HOST: &str = "localhost";

/// Default Tcl RPC port
pub const DEFAULT_PORT: u16 = 6666;

/// Sent right after connecting so the server starts emitting notifications
pub const DEFAULT_NOTIFICATIONS_COMMAND: &str = "tcl_notifications state on";

/// Default deadline for a single command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a single connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection parameters, immutable once the client is built
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) reconnect_policy: Arc<dyn ReconnectPolicy>,
    pub(crate) connect_timeout: Duration,
    pub(crate) command_timeout: Duration,
    pub(crate) max_frame_size: usize,
    pub(crate) notifications_command: String,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` as passed to the resolver
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn notifications_command(&self) -> &str {
        &self.notifications_command
    }

    pub(crate) fn reconnect_delay(&self, attempt: u32) -> Duration {
        self.reconnect_policy.next_delay(attempt)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reconnect_policy: Arc::new(FixedDelay::default()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            notifications_command: DEFAULT_NOTIFICATIONS_COMMAND.to_string(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("max_frame_size", &self.max_frame_size)
            .field("notifications_command", &self.notifications_command)
            .finish_non_exhaustive()
    }
}
