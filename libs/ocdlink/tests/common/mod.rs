//! Common test utilities for ocdlink integration tests
//!
//! [`MockOcdServer`] speaks the 0x1A-terminated Tcl RPC framing over a
//! real loopback socket and answers each request with a scripted list of
//! frames.

#![allow(dead_code)]

use ocdlink::codec::{encode_frame, FRAME_TERMINATOR};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Maps one request to the frames sent back, in order
///
/// An empty list means the request is never answered.
pub type Responder = dyn Fn(&str) -> Vec<String> + Send + Sync + 'static;

struct ServerState {
    responder: Box<Responder>,
    reply_delay: Duration,
    received: Mutex<Vec<String>>,
    clients: Mutex<Vec<TcpStream>>,
    connections: AtomicUsize,
    overlapped: AtomicBool,
    stop: AtomicBool,
}

/// Loopback stand-in for an OpenOCD Tcl server
pub struct MockOcdServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockOcdServer {
    /// Start a server that answers every request with `responder`
    pub fn start(responder: impl Fn(&str) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self::start_with_delay(responder, Duration::ZERO)
    }

    /// Like [`start`](Self::start) but waits `reply_delay` before each reply
    pub fn start_with_delay(
        responder: impl Fn(&str) -> Vec<String> + Send + Sync + 'static,
        reply_delay: Duration,
    ) -> Self {
        Self::serve_listener(TcpListener::bind("127.0.0.1:0").unwrap(), responder, reply_delay)
    }

    /// Start on a specific port, e.g. one a client is already dialing
    pub fn start_on_port(
        port: u16,
        responder: impl Fn(&str) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        Self::serve_listener(listener, responder, Duration::ZERO)
    }

    fn serve_listener(
        listener: TcpListener,
        responder: impl Fn(&str) -> Vec<String> + Send + Sync + 'static,
        reply_delay: Duration,
    ) -> Self {
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(ServerState {
            responder: Box::new(responder),
            reply_delay,
            received: Mutex::new(Vec::new()),
            clients: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        });

        let accept_state = Arc::clone(&state);
        thread::spawn(move || {
            while !accept_state.stop.load(Ordering::Acquire) {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        verbose_println!("mock: accepted {}", peer);
                        stream.set_nonblocking(false).unwrap();
                        accept_state.connections.fetch_add(1, Ordering::AcqRel);
                        accept_state
                            .clients
                            .lock()
                            .push(stream.try_clone().unwrap());
                        let conn_state = Arc::clone(&accept_state);
                        thread::spawn(move || Self::serve(stream, conn_state));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(e) => {
                        eprintln!("mock: accept error: {}", e);
                        break;
                    }
                }
            }
        });

        Self { addr, state }
    }

    /// Answer every request with the request text itself
    pub fn echo() -> Self {
        Self::start(|request| vec![request.to_string()])
    }

    fn serve(stream: TcpStream, state: Arc<ServerState>) {
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(FRAME_TERMINATOR, &mut buf) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if buf.last() != Some(&FRAME_TERMINATOR) {
                return;
            }
            buf.pop();
            let request = String::from_utf8_lossy(&buf).into_owned();
            verbose_println!("mock: <- {:?}", request);
            state.received.lock().push(request.clone());

            if !state.reply_delay.is_zero() {
                thread::sleep(state.reply_delay);
                if !reader.buffer().is_empty() || Self::has_pending_bytes(reader.get_ref()) {
                    state.overlapped.store(true, Ordering::Release);
                }
            }

            for frame in (state.responder)(&request) {
                verbose_println!("mock: -> {:?}", frame);
                if writer.write_all(&encode_frame(&frame)).is_err() {
                    return;
                }
            }
        }
    }

    fn has_pending_bytes(stream: &TcpStream) -> bool {
        let mut probe = [0u8; 1];
        if stream.set_nonblocking(true).is_err() {
            return false;
        }
        let pending = matches!(stream.peek(&mut probe), Ok(n) if n > 0);
        let _ = stream.set_nonblocking(false);
        pending
    }

    /// Send an unsolicited frame to every connected client
    pub fn push(&self, frame: &str) {
        for client in self.state.clients.lock().iter_mut() {
            let _ = client.write_all(&encode_frame(frame));
        }
    }

    /// Send raw bytes, without a terminator, to every connected client
    pub fn push_raw(&self, bytes: &[u8]) {
        for client in self.state.clients.lock().iter_mut() {
            let _ = client.write_all(bytes);
        }
    }

    /// Close every client connection from the server side
    pub fn disconnect_all(&self) {
        for client in self.state.clients.lock().drain(..) {
            let _ = client.shutdown(Shutdown::Both);
        }
    }

    /// Every request received so far, across all connections
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().clone()
    }

    /// Number of connections accepted so far
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::Acquire)
    }

    /// Whether a request ever arrived before the previous one was answered
    pub fn overlapped(&self) -> bool {
        self.state.overlapped.load(Ordering::Acquire)
    }
}

impl Drop for MockOcdServer {
    fn drop(&mut self) {
        self.state.stop.store(true, Ordering::Release);
        self.disconnect_all();
    }
}

/// Route client logs to the test harness when TEST_VERBOSE is set
pub fn init_logging() {
    if std::env::var("TEST_VERBOSE").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("ocdlink=debug"))
            .with_test_writer()
            .try_init();
    }
}

/// Port that nothing listens on
pub fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
