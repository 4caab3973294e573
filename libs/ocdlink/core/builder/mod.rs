pub mod states;

use crate::client::OcdClient;
use crate::config::ClientConfig;
use crate::traits::{Dispatcher, ReconnectPolicy};
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`OcdClient`]
///
/// Every setting has a default except the dispatcher, which `build()`
/// requires at compile time.
///
/// ```ignore
/// let dispatcher = ThreadDispatcher::new("ocd-events")?;
/// let client = OcdClient::builder()
///     .host("localhost")
///     .port(6666)
///     .command_timeout(Duration::from_secs(5))
///     .dispatcher(dispatcher)
///     .build();
/// client.start()?;
/// ```
pub struct ClientBuilder<D>
where
    D: DispatcherState,
{
    config: ClientConfig,
    dispatcher: D,
}

impl ClientBuilder<NoDispatcher> {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            dispatcher: NoDispatcher,
        }
    }

    /// Set the execution context notification callbacks run on
    pub fn dispatcher(self, dispatcher: impl Dispatcher) -> ClientBuilder<HasDispatcher> {
        self.shared_dispatcher(Arc::new(dispatcher))
    }

    /// Set a dispatcher that is shared with other components
    pub fn shared_dispatcher(self, dispatcher: Arc<dyn Dispatcher>) -> ClientBuilder<HasDispatcher> {
        ClientBuilder {
            config: self.config,
            dispatcher: HasDispatcher(dispatcher),
        }
    }
}

impl Default for ClientBuilder<NoDispatcher> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<D> ClientBuilder<D>
where
    D: DispatcherState,
{
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Replace all connection settings at once
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn reconnect_policy(mut self, policy: impl ReconnectPolicy) -> Self {
        self.config.reconnect_policy = Arc::new(policy);
        self
    }

    /// Bound a single connection attempt
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Deadline attached to every command issued through the client
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Largest frame accepted before the connection is treated as broken
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.config.max_frame_size = bytes;
        self
    }

    /// Command sent after every successful connect
    pub fn notifications_command(mut self, command: impl Into<String>) -> Self {
        self.config.notifications_command = command.into();
        self
    }
}

// Build method - only available once a dispatcher is set
impl ClientBuilder<HasDispatcher> {
    pub fn build(self) -> OcdClient {
        let HasDispatcher(dispatcher) = self.dispatcher;
        OcdClient::new(self.config, dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ExponentialBackoff, InlineDispatcher};

    #[test]
    fn test_builder_applies_settings() {
        let client = ClientBuilder::new()
            .host("10.0.0.2")
            .port(50001)
            .command_timeout(Duration::from_millis(750))
            .connect_timeout(Duration::from_millis(250))
            .max_frame_size(8192)
            .notifications_command("tcl_notifications on")
            .reconnect_policy(ExponentialBackoff::new(
                Duration::from_millis(50),
                Duration::from_secs(2),
            ))
            .dispatcher(InlineDispatcher)
            .build();

        let config = client.config();
        assert_eq!(config.address(), "10.0.0.2:50001");
        assert_eq!(config.command_timeout(), Duration::from_millis(750));
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_frame_size(), 8192);
        assert_eq!(config.notifications_command(), "tcl_notifications on");
        assert_eq!(config.reconnect_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_settings_survive_setting_dispatcher_late() {
        let client = ClientBuilder::new()
            .port(7777)
            .dispatcher(InlineDispatcher)
            .host("probe.local")
            .build();
        assert_eq!(client.config().address(), "probe.local:7777");
    }
}
