use std::io;
use thiserror::Error;

use super::types::{LinkAddress, NodeId};

/// Error types for the canopy protocol
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("No route to target {0}")]
    UnknownTarget(NodeId),

    #[error("Transport timed out sending to {0}")]
    TransportTimeout(LinkAddress),

    #[error("Not connected to a parent")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedFrame(msg.into())
    }

    /// Creates a new unknown message kind error
    pub fn unknown_kind(msg: impl Into<String>) -> Self {
        Error::UnknownMessageKind(msg.into())
    }

    /// Creates a new resource exhausted error
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Error::ResourceExhausted(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new channel closed error
    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Error::ChannelClosed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::malformed("frame too short");
        assert!(matches!(err, Error::MalformedFrame(_)));
        assert_eq!(err.to_string(), "Malformed frame: frame too short");
    }

    #[test]
    fn test_unknown_target_display() {
        let err = Error::UnknownTarget(NodeId(999));
        assert_eq!(err.to_string(), "No route to target 999");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
