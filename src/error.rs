use thiserror::Error;

/// Reasons a streaming session ends.
///
/// Every variant is terminal: the session stops and the transport closes the
/// connection. Nothing is sent to the client after the stream has started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("camera capture failed")]
    Capture,
    #[error("JPEG compression failed: {0}")]
    Encode(String),
    #[error("failed to send chunk: {0}")]
    Transport(String),
    #[error("failed to set stream headers: {0}")]
    HeaderSetup(String),
}
