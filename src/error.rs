use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Unified error type for the Cortex streaming channel
#[derive(Error, Debug)]
pub enum CortexError {
    // Transport errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    // Frame errors
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Frame of type '{kind}' carries neither 'data' nor 'payload'")]
    MissingPayload { kind: String },

    // Subscriber errors
    #[error("Handler failed: {0}")]
    Handler(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Cortex operations
pub type Result<T> = std::result::Result<T, CortexError>;

impl CortexError {
    /// Check if this error came from the socket itself rather than from a
    /// frame or a subscriber
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            CortexError::WebSocket(_) | CortexError::Connection(_) | CortexError::Io(_)
        )
    }

    /// Check if this error only affects a single frame
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            CortexError::Decode(_) | CortexError::MissingPayload { .. }
        )
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for CortexError {
    fn from(err: url::ParseError) -> Self {
        CortexError::InvalidUrl(err.to_string())
    }
}
