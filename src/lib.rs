//! Cortex - Execution Log Streaming
//!
//! Client side of the Cortex dashboard's real-time channel.
//!
//! ## Features
//!
//! - Reconnecting WebSocket client with a fixed-interval, bounded retry policy
//! - Decoding of single and newline-batched JSON frames
//! - Normalization of inconsistently cased backend fields
//! - Log and status aggregation scoped to one execution
//! - Event fan-out to any number of subscribers

pub mod config;
pub mod error;
pub mod models;
pub mod stream;

pub use config::Config;
pub use error::{CortexError, Result};
pub use stream::{ChannelEvent, LogAggregator, ReconnectPolicy, SocketManager, WsTransport};
