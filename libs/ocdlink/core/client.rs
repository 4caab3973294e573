//! Public client handle

use crate::builder::{states::NoDispatcher, ClientBuilder};
use crate::config::ClientConfig;
use crate::connection_state::{ConnectionState, Metrics};
use crate::memory::{parse_word_reply, read_word_command};
use crate::notification::{TargetEvent, TargetResetMode, TargetState};
use crate::publisher::{ClientEvent, EventPublisher};
use crate::queue::CommandHandle;
use crate::traits::{Dispatcher, OcdError, Result};
use crate::worker::{self, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

const WORKER_THREAD_NAME: &str = "ocdlink-worker";

/// Client for the OpenOCD Tcl RPC interface
///
/// All socket I/O happens on one worker thread started by
/// [`OcdClient::start`]. Commands may be issued from any thread and are
/// answered strictly in submission order; notifications are delivered to
/// subscribers through the configured [`Dispatcher`].
///
/// ```no_run
/// use ocdlink::{OcdClient, ThreadDispatcher};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OcdClient::builder()
///     .host("localhost")
///     .port(6666)
///     .dispatcher(ThreadDispatcher::new("ocd-events")?)
///     .build();
///
/// client.on_target_state(|state| println!("target is {state}"));
/// client.start()?;
///
/// let word = client.read_memory(0x2000_0000)?;
/// println!("0x{word:08X}");
/// # Ok(())
/// # }
/// ```
pub struct OcdClient {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl OcdClient {
    pub fn builder() -> ClientBuilder<NoDispatcher> {
        ClientBuilder::new()
    }

    /// Create a stopped client; nothing connects until [`start`](Self::start)
    pub fn new(config: ClientConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared::new(config, EventPublisher::new(dispatcher))),
            shutdown_tx,
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Spawn the worker thread; later calls are no-ops
    ///
    /// # Errors
    /// - [`OcdError::ShutDown`] after [`shutdown`](Self::shutdown)
    /// - [`OcdError::Spawn`] when the runtime or thread cannot be created
    pub fn start(&self) -> Result<()> {
        if self.shared.queue.is_closed() {
            return Err(OcdError::ShutDown);
        }

        let mut worker = self.worker.lock();
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| OcdError::Spawn(e.to_string()))?;

        let shared = Arc::clone(&self.shared);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(worker::run(shared, shutdown_rx)))
            .map_err(|e| OcdError::Spawn(e.to_string()))?;

        *worker = Some(handle);
        self.started.store(true, Ordering::Release);
        info!("Started client for {}", self.shared.config.address());
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    pub fn metrics(&self) -> Metrics {
        self.shared.metrics.snapshot(self.shared.state.get())
    }

    /// Queue a command with the configured timeout and return immediately
    pub fn enqueue(&self, command: &str) -> Result<CommandHandle> {
        self.enqueue_with_timeout(command, self.shared.config.command_timeout())
    }

    /// Queue a command with its own timeout
    ///
    /// # Errors
    /// - [`OcdError::NotStarted`] before [`start`](Self::start)
    /// - [`OcdError::ShutDown`] after [`shutdown`](Self::shutdown)
    pub fn enqueue_with_timeout(&self, command: &str, timeout: Duration) -> Result<CommandHandle> {
        if !self.is_started() {
            return Err(OcdError::NotStarted);
        }
        self.shared.queue.enqueue(command, timeout)
    }

    /// Send a command and block until its response arrives
    ///
    /// Commands queued while disconnected wait for the next connection
    /// until their timeout runs out.
    pub fn issue_command(&self, command: &str) -> Result<String> {
        self.enqueue(command)?.wait()
    }

    pub fn issue_command_timeout(&self, command: &str, timeout: Duration) -> Result<String> {
        self.enqueue_with_timeout(command, timeout)?.wait()
    }

    /// Read one 32-bit word of target memory
    pub fn read_memory(&self, address: u32) -> Result<u32> {
        let reply = self.issue_command(&read_word_command(address))?;
        parse_word_reply(&reply, address)
    }

    /// Read `count` consecutive words starting at `address`
    ///
    /// All reads are queued up front, so they go out back to back.
    ///
    /// # Errors
    /// [`OcdError::AddressOverflow`] when the block runs past `0xFFFF_FFFF`;
    /// nothing is sent in that case.
    pub fn read_memory_block(&self, address: u32, count: usize) -> Result<Vec<u32>> {
        let max_words = u64::from(u32::MAX - address) / 4 + 1;
        if count as u64 > max_words {
            return Err(OcdError::AddressOverflow {
                address,
                words: count,
            });
        }

        let mut pending = Vec::with_capacity(count);
        let mut word_address = address;
        for index in 0..count {
            if index > 0 {
                // In range: count was checked against the address space
                word_address = word_address.wrapping_add(4);
            }
            pending.push((word_address, self.enqueue(&read_word_command(word_address))?));
        }

        pending
            .into_iter()
            .map(|(word_address, handle)| parse_word_reply(&handle.wait()?, word_address))
            .collect()
    }

    pub fn on_target_event(&self, callback: impl Fn(TargetEvent) + Send + Sync + 'static) {
        self.shared.publisher.on_target_event(callback);
    }

    pub fn on_target_state(&self, callback: impl Fn(TargetState) + Send + Sync + 'static) {
        self.shared.publisher.on_target_state(callback);
    }

    pub fn on_target_reset(&self, callback: impl Fn(TargetResetMode) + Send + Sync + 'static) {
        self.shared.publisher.on_target_reset(callback);
    }

    pub fn on_connection_changed(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        self.shared.publisher.on_connection_changed(callback);
    }

    pub fn on_event(&self, callback: impl Fn(ClientEvent) + Send + Sync + 'static) {
        self.shared.publisher.on_event(callback);
    }

    /// Stop the worker and fail everything still queued with
    /// [`OcdError::ShutDown`]
    ///
    /// Idempotent. Joins the worker unless called from a callback running
    /// on the worker thread itself.
    pub fn shutdown(&self) {
        self.shared.queue.close();
        self.shutdown_tx.send_replace(true);

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                debug!("Shutdown requested from the worker thread, not joining");
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
            info!("Client for {} stopped", self.shared.config.address());
        }

        // Covers commands raced in before close, or a never-started client
        self.shared.queue.fail_all(|| OcdError::ShutDown);
    }
}

impl Drop for OcdClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for OcdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcdClient")
            .field("config", &self.shared.config)
            .field("state", &self.shared.state.get())
            .field("started", &self.is_started())
            .finish()
    }
}
