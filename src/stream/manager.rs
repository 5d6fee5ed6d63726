//! Reconnecting socket manager
//!
//! Keeps one WebSocket session alive per manager. A session is a spawned task
//! that opens the socket through the injected [`Transport`], pumps inbound
//! frames to the [`ChannelHandler`] and outbound payloads to the socket. When
//! a session ends unexpectedly a single reconnect timer is armed, up to the
//! configured number of attempts.
//!
//! Every session and timer carries the generation it was started under.
//! `connect()` and `disconnect()` bump the generation, so anything left over
//! from before becomes inert even if it is still winding down.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::transport::Transport;
use crate::error::{CortexError, Result};
use crate::models::Frame;

/// Fixed-interval reconnect policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect automatically after an unplanned close
    pub enabled: bool,
    /// Delay before each reconnect attempt
    pub interval: Duration,
    /// Attempts allowed between two successful opens
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Receives connection events from a [`SocketManager`].
///
/// Callbacks run on the session task. Errors returned from `on_message` and
/// panics from any callback are logged and swallowed; they never affect the
/// socket.
pub trait ChannelHandler: Send + Sync {
    fn on_connect(&self) {}

    fn on_message(&self, frame: &Frame) -> Result<()>;

    fn on_error(&self, _error: &CortexError) {}

    fn on_disconnect(&self) {}
}

/// Shutdown signal for a running session
struct SessionHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SessionHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[derive(Default)]
struct ManagerState {
    generation: u64,
    attempts: u32,
    session: Option<SessionHandle>,
    /// Present only while the socket is open
    outbound: Option<mpsc::UnboundedSender<String>>,
    reconnect_timer: Option<JoinHandle<()>>,
    last_frame: Option<Frame>,
}

struct Inner {
    url: Url,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn ChannelHandler>,
    state: Mutex<ManagerState>,
    connected: watch::Sender<bool>,
}

/// Reconnecting WebSocket client for one endpoint
#[derive(Clone)]
pub struct SocketManager {
    inner: Arc<Inner>,
}

impl SocketManager {
    pub fn new(
        url: Url,
        policy: ReconnectPolicy,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                url,
                policy,
                transport,
                handler,
                state: Mutex::new(ManagerState::default()),
                connected,
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }

    /// Open a new socket, closing the current one first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut state = self.inner.state.lock();
        self.inner.start_session(&mut state);
    }

    /// Close the socket and cancel any pending reconnect.
    ///
    /// No automatic reconnect happens until `connect()` is called again.
    pub fn disconnect(&self) {
        let was_connected = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            if let Some(timer) = state.reconnect_timer.take() {
                timer.abort();
                debug!("Cancelled pending reconnect to {}", self.inner.url);
            }
            if let Some(session) = state.session.take() {
                session.shutdown();
            }
            state.outbound = None;
            self.inner.connected.send_replace(false)
        };

        if was_connected {
            info!("WebSocket to {} closed by client", self.inner.url);
            self.inner.guard("disconnect", || {
                self.inner.handler.on_disconnect();
                Ok(())
            });
        }
    }

    /// Serialize `payload` and send it if the socket is open.
    ///
    /// Returns whether the payload was queued; never fails.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize outbound message: {}", e);
                return false;
            }
        };

        let state = self.inner.state.lock();
        if let Some(tx) = state.outbound.as_ref() {
            if tx.send(text).is_ok() {
                return true;
            }
        }
        warn!("WebSocket is not connected");
        false
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// Receiver that observes every connectivity change
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Reconnect attempts made since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().attempts
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.inner
            .state
            .lock()
            .reconnect_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// True when no socket is open or opening and no reconnect is pending.
    ///
    /// After an unplanned close this means the manager has given up until
    /// `connect()` is called again.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.session.is_none()
            && state
                .reconnect_timer
                .as_ref()
                .is_none_or(|timer| timer.is_finished())
    }

    /// The most recently decoded frame
    pub fn last_frame(&self) -> Option<Frame> {
        self.inner.state.lock().last_frame.clone()
    }
}

impl Inner {
    fn start_session(self: &Arc<Self>, state: &mut ManagerState) {
        if let Some(timer) = state.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(session) = state.session.take() {
            debug!("Closing existing WebSocket to {}", self.url);
            session.shutdown();
        }
        state.outbound = None;
        self.connected.send_replace(false);

        state.generation += 1;
        let generation = state.generation;

        let (handle, shutdown_rx) = SessionHandle::new();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_session(generation, shutdown_rx).await;
        });
        state.session = Some(handle);
    }

    #[instrument(skip(self, shutdown), fields(url = %self.url))]
    async fn run_session(self: Arc<Self>, generation: u64, mut shutdown: watch::Receiver<bool>) {
        let connecting = AssertUnwindSafe(self.transport.connect(&self.url)).catch_unwind();
        let connected = tokio::select! {
            result = connecting => result.unwrap_or_else(|payload| {
                Err(CortexError::Connection(format!(
                    "transport panicked: {}",
                    panic_message(payload.as_ref())
                )))
            }),
            _ = shutdown.changed() => {
                debug!("Connection attempt abandoned");
                return;
            }
        };

        let (mut sink, mut stream) = match connected {
            Ok(pair) => pair,
            Err(e) => {
                self.notify_error(&e);
                self.handle_close(generation);
                return;
            }
        };

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        if !self.handle_open(generation, outbound_tx) {
            let _ = sink.close().await;
            return;
        }

        loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(text)) => self.handle_text(&text),
                    Some(Err(e)) => {
                        self.notify_error(&e);
                        break;
                    }
                    None => break,
                },
                Some(payload) = outbound_rx.recv() => {
                    if let Err(e) = sink.send(payload).await {
                        self.notify_error(&e);
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Closing WebSocket");
                    let _ = sink.close().await;
                    return;
                }
            }
        }

        self.handle_close(generation);
    }

    fn handle_open(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return false;
            }
            state.attempts = 0;
            state.outbound = Some(outbound);
            self.connected.send_replace(true);
        }

        info!("WebSocket connected to {}", self.url);
        self.guard("connect", || {
            self.handler.on_connect();
            Ok(())
        });
        true
    }

    fn handle_text(&self, text: &str) {
        debug!("Raw WebSocket message: {}", text);

        let (frames, decode_errors) = Frame::decode_batch(text);
        for e in decode_errors {
            error!("Failed to parse WebSocket message: {} (raw data: {})", e, text);
        }

        for frame in frames {
            debug!("Parsed {} frame", frame.kind);
            self.state.lock().last_frame = Some(frame.clone());
            self.guard("message", || self.handler.on_message(&frame));
        }
    }

    fn handle_close(self: &Arc<Self>, generation: u64) {
        let scheduled = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.outbound = None;
            state.session = None;
            self.connected.send_replace(false);

            if self.policy.enabled && state.attempts < self.policy.max_attempts {
                state.attempts += 1;
                state.reconnect_timer = Some(self.schedule_reconnect(generation));
                Some(state.attempts)
            } else {
                None
            }
        };

        info!("WebSocket disconnected from {}", self.url);
        self.guard("disconnect", || {
            self.handler.on_disconnect();
            Ok(())
        });

        match scheduled {
            Some(attempt) => info!(
                "Attempting to reconnect ({}/{}) in {}ms",
                attempt,
                self.policy.max_attempts,
                self.policy.interval.as_millis()
            ),
            None if self.policy.enabled => debug!(
                "Giving up on {} after {} reconnect attempts",
                self.url, self.policy.max_attempts
            ),
            None => {}
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let delay = self.policy.interval;
        tokio::spawn(async move {
            sleep(delay).await;
            inner.fire_reconnect(generation);
        })
    }

    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        // This is the running timer; it must not abort itself.
        state.reconnect_timer = None;
        self.start_session(&mut state);
    }

    fn notify_error(&self, err: &CortexError) {
        if err.is_transport_error() {
            warn!("WebSocket error: {}", err);
        } else {
            error!("WebSocket error: {}", err);
        }
        self.guard("error", || {
            self.handler.on_error(err);
            Ok(())
        });
    }

    /// Run a handler callback, logging whatever it returns or panics with
    fn guard<F>(&self, event: &str, f: F)
    where
        F: FnOnce() -> Result<()>,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_frame_error() => warn!("Dropped frame: {}", e),
            Ok(Err(e)) => error!("Error handling WebSocket {} event: {}", event, e),
            Err(payload) => {
                let e =
                    CortexError::Handler(format!("panicked: {}", panic_message(payload.as_ref())));
                error!("Error handling WebSocket {} event: {}", event, e);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
