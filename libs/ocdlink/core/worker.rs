//! Connection worker
//!
//! A single task owns the socket for the lifetime of the client and runs
//! this state machine:
//!
//! ```text
//!            connect fails: wait policy delay
//!          ┌──────────────┐
//!          ▼              │
//!   Disconnected ──► Connecting ──► Connected
//!          ▲                            │
//!          └─I/O fault, EOF, late reply ┘
//! ```
//!
//! While connected the task drains the command queue first, one command
//! in flight at a time, and only then waits for either new commands or
//! unsolicited frames.

use crate::codec::{write_frame, FrameReader};
use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::notification::{classify, Frame};
use crate::publisher::{ClientEvent, EventPublisher};
use crate::queue::{CommandQueue, PendingCommand};
use crate::traits::{OcdError, Result};
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

/// State shared between the worker and the client handle
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) state: AtomicConnectionState,
    pub(crate) metrics: AtomicMetrics,
    pub(crate) queue: CommandQueue,
    pub(crate) publisher: EventPublisher,
}

impl Shared {
    pub(crate) fn new(config: ClientConfig, publisher: EventPublisher) -> Self {
        Self {
            config,
            state: AtomicConnectionState::default(),
            metrics: AtomicMetrics::new(),
            queue: CommandQueue::new(),
            publisher,
        }
    }

    fn transition(&self, next: ConnectionState) {
        let previous = self.state.set(next);
        if previous == next {
            return;
        }
        debug!("Connection state {} -> {}", previous, next);

        if next == ConnectionState::Connected {
            self.publisher.publish(ClientEvent::ConnectionChanged(true));
        } else if previous == ConnectionState::Connected {
            self.publisher.publish(ClientEvent::ConnectionChanged(false));
        }
    }

    fn fail_queued(&self, error: fn() -> OcdError) {
        let failed = self.queue.fail_all(error);
        if failed > 0 {
            debug!("Failed {} queued commands", failed);
            self.record_failed(failed);
        }
    }

    fn record_failed(&self, count: usize) {
        self.metrics.add_failed(count as u64);
    }
}

/// Why a connected session ended
enum SessionEnd {
    Shutdown,
    /// Transport fault or peer close; queued commands fail
    Lost(OcdError),
    /// Dropped by us after a missed reply; queued commands were never
    /// sent and carry over to the next connection
    Reset,
}

/// Main worker loop, returns only on shutdown
pub(crate) async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let address = shared.config.address();
    let mut failed_attempts: u32 = 0;
    let mut has_connected = false;

    loop {
        if *shutdown.borrow() {
            break;
        }

        shared.transition(ConnectionState::Connecting);

        let established = tokio::select! {
            result = establish(&shared) => result,
            _ = shutdown.changed() => break,
        };

        let mut session = match established {
            Ok(session) => session,
            Err(e) => {
                if failed_attempts == 0 {
                    info!("Waiting for debug server at {}: {}", address, e);
                } else {
                    debug!("Connect attempt {} to {} failed: {}", failed_attempts + 1, address, e);
                }
                shared.transition(ConnectionState::Disconnected);

                let delay = shared.config.reconnect_delay(failed_attempts);
                failed_attempts = failed_attempts.saturating_add(1);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => continue,
                    _ = shutdown.changed() => break,
                }
            }
        };

        if has_connected {
            shared.metrics.increment_reconnects();
        }
        has_connected = true;
        failed_attempts = 0;

        info!("Connected to {}", address);
        shared.transition(ConnectionState::Connected);

        match session.run(&mut shutdown).await {
            SessionEnd::Shutdown => break,
            SessionEnd::Lost(e) => {
                warn!("Connection to {} lost: {}", address, e);
                shared.transition(ConnectionState::Disconnected);
                shared.fail_queued(|| OcdError::ConnectionLost);
            }
            SessionEnd::Reset => {
                info!("Reconnecting to {} to discard a late reply", address);
                shared.transition(ConnectionState::Disconnected);
            }
        }
    }

    shared.transition(ConnectionState::Disconnected);
    shared.fail_queued(|| OcdError::ShutDown);
    info!("Worker for {} exiting", address);
}

/// Open the socket and switch the server into notification mode
async fn establish(shared: &Shared) -> Result<Session<'_>> {
    let config = &shared.config;

    let stream = timeout(config.connect_timeout(), TcpStream::connect(config.address()))
        .await
        .map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")
        })??;
    stream.set_nodelay(true)?;

    let (read_half, write_half) = stream.into_split();
    let mut session = Session {
        reader: FrameReader::new(read_half, config.max_frame_size()),
        writer: write_half,
        shared,
    };

    let deadline = Instant::now() + config.command_timeout();
    let reply = timeout_at(deadline, session.exchange(config.notifications_command()))
        .await
        .map_err(|_| OcdError::Timeout(config.command_timeout()))??;
    debug!("Notifications enabled: {:?}", reply);

    Ok(session)
}

/// Whether the session keeps serving after a command
enum Flow {
    Continue,
    Stop(SessionEnd),
}

/// One live connection; owns both socket halves
struct Session<'a> {
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    shared: &'a Shared,
}

impl Session<'_> {
    async fn run(&mut self, shutdown: &mut watch::Receiver<bool>) -> SessionEnd {
        match self.serve(shutdown).await {
            Ok(end) => end,
            Err(e) => SessionEnd::Lost(e),
        }
    }

    async fn serve(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<SessionEnd> {
        let shared = self.shared;
        let queue = &shared.queue;

        loop {
            // Request/response work takes priority over idle polling
            while let Some(command) = queue.pop() {
                match self.process(command, shutdown).await? {
                    Flow::Continue => {}
                    Flow::Stop(end) => return Ok(end),
                }
            }

            // Frames that arrived in the same read as the last response
            while let Some(frame) = self.reader.try_next_frame()? {
                self.route(classify(frame));
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
                _ = queue.ready() => {}
                frame = self.reader.next_frame() => match frame? {
                    Some(frame) => self.route(classify(frame)),
                    None => return Err(OcdError::ConnectionLost),
                },
            }
        }
    }

    /// Run one queued command
    async fn process(
        &mut self,
        command: PendingCommand,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Flow> {
        if command.is_expired() {
            debug!("Skipping expired command {:?}", command.request());
            self.shared.record_failed(1);
            return Ok(Flow::Continue);
        }

        let deadline = Instant::from_std(command.deadline());
        let outcome = tokio::select! {
            result = timeout_at(deadline, self.exchange(command.request())) => result,
            _ = shutdown.changed() => {
                command.fulfill(Err(OcdError::ShutDown));
                self.shared.record_failed(1);
                return Ok(Flow::Stop(SessionEnd::Shutdown));
            }
        };

        match outcome {
            Ok(Ok(response)) => {
                command.fulfill(Ok(response));
                Ok(Flow::Continue)
            }
            Ok(Err(e)) => {
                command.fulfill(Err(OcdError::ConnectionLost));
                self.shared.record_failed(1);
                Err(e)
            }
            Err(_) => {
                // A late reply would be taken for the next command's
                let timeout = command.timeout();
                warn!("No reply to {:?} within {:?}, resetting connection", command.request(), timeout);
                command.fulfill(Err(OcdError::Timeout(timeout)));
                self.shared.record_failed(1);
                Ok(Flow::Stop(SessionEnd::Reset))
            }
        }
    }

    /// Send one command and wait for its plain response
    ///
    /// Notifications read while waiting are published, never returned.
    async fn exchange(&mut self, request: &str) -> Result<String> {
        write_frame(&mut self.writer, request).await?;
        self.shared.metrics.increment_sent();
        debug!("Sent {:?}", request);

        loop {
            let frame = self
                .reader
                .next_frame()
                .await?
                .ok_or(OcdError::ConnectionLost)?;

            match classify(frame) {
                Frame::Response(text) => {
                    self.shared.metrics.increment_responses();
                    debug!("Response {:?}", text);
                    return Ok(text);
                }
                other => self.route(other),
            }
        }
    }

    /// Handle a frame that is not the pending command's response
    fn route(&self, frame: Frame) {
        let shared = self.shared;
        match frame {
            Frame::Notification(notification) => {
                debug!("Notification {}", notification);
                shared.metrics.increment_notifications();
                shared
                    .publisher
                    .publish(ClientEvent::Notification(notification));
            }
            Frame::Unrecognized { kind, token } => {
                debug!("Ignoring {}notification with unknown token {:?}", kind.prefix(), token);
                shared.metrics.increment_unrecognized();
            }
            Frame::Response(text) => {
                debug!("Discarding unsolicited frame {:?}", text);
            }
        }
    }
}
