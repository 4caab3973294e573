//! Command queue between caller threads and the connection worker
//!
//! Many producers, one consumer. Each entry pairs a request with a
//! single-use reply slot; the caller keeps the receiving half in a
//! [`CommandHandle`] and blocks on it with a deadline.

use crate::traits::{OcdError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A request waiting to be written to the connection
///
/// Consumed by [`PendingCommand::fulfill`], so it resolves at most once.
/// Dropping it unfulfilled resolves the caller with
/// [`OcdError::ConnectionLost`].
#[derive(Debug)]
pub struct PendingCommand {
    request: String,
    deadline: Instant,
    timeout: Duration,
    reply: Sender<Result<String>>,
}

impl PendingCommand {
    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Timeout the command was queued with
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Resolve the command, waking its caller
    pub fn fulfill(self, result: Result<String>) {
        // Caller may have timed out and dropped its handle
        let _ = self.reply.send(result);
    }
}

/// Caller side of a queued command
#[derive(Debug)]
pub struct CommandHandle {
    reply: Receiver<Result<String>>,
    deadline: Instant,
    timeout: Duration,
}

impl CommandHandle {
    /// Block until the command resolves or its deadline passes
    ///
    /// # Errors
    /// - [`OcdError::Timeout`] when the deadline passes first
    /// - [`OcdError::ConnectionLost`] when the command was dropped unresolved
    /// - whatever error the worker resolved the command with
    pub fn wait(self) -> Result<String> {
        match self.reply.recv_deadline(self.deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(OcdError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(OcdError::ConnectionLost),
        }
    }

    /// Non-blocking check; `None` while the command is still pending
    pub fn try_result(&self) -> Option<Result<String>> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(OcdError::ConnectionLost)),
        }
    }
}

/// FIFO of pending commands with an async wakeup for the worker
#[derive(Debug)]
pub struct CommandQueue {
    sender: Sender<PendingCommand>,
    receiver: Receiver<PendingCommand>,
    wakeup: Notify,
    closed: AtomicBool,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            wakeup: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Append a command; safe to call from any thread
    ///
    /// # Errors
    /// [`OcdError::ShutDown`] once the queue is closed.
    pub fn enqueue(&self, request: impl Into<String>, timeout: Duration) -> Result<CommandHandle> {
        if self.is_closed() {
            return Err(OcdError::ShutDown);
        }

        let deadline = Instant::now() + timeout;
        let (reply_tx, reply_rx) = bounded(1);
        let command = PendingCommand {
            request: request.into(),
            deadline,
            timeout,
            reply: reply_tx,
        };

        self.sender.send(command).map_err(|_| OcdError::ShutDown)?;
        self.wakeup.notify_one();

        Ok(CommandHandle {
            reply: reply_rx,
            deadline,
            timeout,
        })
    }

    /// Pop the oldest command without blocking
    pub fn pop(&self) -> Option<PendingCommand> {
        self.receiver.try_recv().ok()
    }

    /// Wait until a command may be available
    ///
    /// Wakeups are stored, so an enqueue racing with this call is not lost.
    pub async fn ready(&self) {
        if self.receiver.is_empty() {
            self.wakeup.notified().await;
        }
    }

    /// Resolve every queued command with an error built by `error`
    ///
    /// Returns how many commands were failed.
    pub fn fail_all(&self, error: impl Fn() -> OcdError) -> usize {
        let mut count = 0;
        while let Some(command) = self.pop() {
            command.fulfill(Err(error()));
            count += 1;
        }
        count
    }

    /// Reject further commands and wake the worker
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wakeup.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
