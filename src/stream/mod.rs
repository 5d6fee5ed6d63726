//! Real-time execution log streaming
//!
//! [`SocketManager`] owns the WebSocket and its reconnect policy;
//! [`LogAggregator`] turns the frames it receives into log and status state.

pub mod aggregator;
pub mod endpoint;
pub mod manager;
pub mod normalize;
pub mod transport;

pub use aggregator::{ChannelEvent, LogAggregator, EVENT_BUFFER_SIZE};
pub use endpoint::resolve_ws_url;
pub use manager::{ChannelHandler, ReconnectPolicy, SocketManager};
pub use transport::{FrameSink, FrameStream, Transport, WsTransport};
