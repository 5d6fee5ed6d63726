//! Execution log aggregator
//!
//! Subscribes to a [`SocketManager`] and folds `log` and `status` frames into
//! an ordered log buffer and a current status record, optionally scoped to a
//! single execution. Every change is also broadcast as a [`ChannelEvent`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use url::Url;

use super::manager::{ChannelHandler, ReconnectPolicy, SocketManager};
use super::normalize;
use super::transport::Transport;
use crate::config::Config;
use crate::error::{CortexError, Result};
use crate::models::{Frame, FrameKind, LogEntry, StatusRecord};

/// Maximum number of events buffered per subscriber
pub const EVENT_BUFFER_SIZE: usize = 1024;

/// Change notifications fanned out to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Log(LogEntry),
    Status(StatusRecord),
    Cleared,
}

#[derive(Default)]
struct AggregateState {
    logs: Vec<LogEntry>,
    status: Option<StatusRecord>,
}

struct AggregatorHandler {
    filter: Option<String>,
    state: Mutex<AggregateState>,
    events: broadcast::Sender<ChannelEvent>,
}

impl AggregatorHandler {
    fn new(filter: Option<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            filter,
            state: Mutex::new(AggregateState::default()),
            events,
        }
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.logs.clear();
        state.status = None;
        let _ = self.events.send(ChannelEvent::Cleared);
    }
}

impl ChannelHandler for AggregatorHandler {
    fn on_connect(&self) {
        let _ = self.events.send(ChannelEvent::Connected);
    }

    fn on_message(&self, frame: &Frame) -> Result<()> {
        let body = frame.body().ok_or_else(|| CortexError::MissingPayload {
            kind: frame.kind.to_string(),
        })?;
        let filter = self.filter.as_deref();

        match frame.kind {
            FrameKind::Log => {
                let entry = normalize::log_entry(frame, body);
                if !entry.matches(filter) {
                    debug!(
                        "Skipping log for {:?} (filter {:?})",
                        entry.subject, filter
                    );
                    return Ok(());
                }
                let mut state = self.state.lock();
                state.logs.push(entry.clone());
                let _ = self.events.send(ChannelEvent::Log(entry));
            }
            FrameKind::Status => {
                let record = normalize::status_record(frame, body);
                if !record.matches(filter) {
                    debug!(
                        "Skipping status for {:?} (filter {:?})",
                        record.subject, filter
                    );
                    return Ok(());
                }
                let mut state = self.state.lock();
                state.status = Some(record.clone());
                let _ = self.events.send(ChannelEvent::Status(record));
            }
            FrameKind::Metrics | FrameKind::Unknown => {
                debug!("Ignoring {} frame", frame.kind);
            }
        }

        Ok(())
    }

    fn on_disconnect(&self) {
        let _ = self.events.send(ChannelEvent::Disconnected);
    }
}

/// Live view of execution logs and status over one streaming connection.
///
/// Dropping the aggregator disconnects its socket.
pub struct LogAggregator {
    handler: Arc<AggregatorHandler>,
    manager: SocketManager,
}

impl LogAggregator {
    /// Create an aggregator; call [`LogAggregator::connect`] to start streaming.
    ///
    /// With `filter` set, only frames for that execution (or frames carrying
    /// no execution id at all) are kept.
    pub fn new(
        url: Url,
        policy: ReconnectPolicy,
        transport: Arc<dyn Transport>,
        filter: Option<String>,
    ) -> Self {
        let handler = Arc::new(AggregatorHandler::new(filter));
        let manager = SocketManager::new(url, policy, transport, handler.clone());
        Self { handler, manager }
    }

    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self::new(
            config.ws_url()?,
            config.reconnect_policy(),
            transport,
            config.stream.execution_id.clone(),
        ))
    }

    pub fn filter(&self) -> Option<&str> {
        self.handler.filter.as_deref()
    }

    pub fn connect(&self) {
        self.manager.connect();
    }

    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        self.manager.send(payload)
    }

    /// Empty the log buffer and forget the current status
    pub fn clear_logs(&self) {
        self.handler.clear();
    }

    /// Snapshot of the log buffer in receipt order
    pub fn logs(&self) -> Vec<LogEntry> {
        self.handler.state.lock().logs.clone()
    }

    pub fn log_count(&self) -> usize {
        self.handler.state.lock().logs.len()
    }

    pub fn status(&self) -> Option<StatusRecord> {
        self.handler.state.lock().status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.manager.watch_connected()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.handler.events.subscribe()
    }

    /// Subscribe as a stream; lagging subscribers skip what they missed
    pub fn events(&self) -> impl Stream<Item = ChannelEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                warn!("Event subscriber lagged, missed {} events", n);
                None
            }
        })
    }

    pub fn manager(&self) -> &SocketManager {
        &self.manager
    }
}

impl Drop for LogAggregator {
    fn drop(&mut self) {
        self.manager.disconnect();
    }
}
