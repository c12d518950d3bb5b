//! Core types for the canopy protocol
//!
//! Identifiers, configuration and the error type shared by every other module.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    LinkAddress,
    LinkQuality,
    NodeConfig,
    NodeId,
    NodeRole,
    Order,
    Reading,
};

/// Default retry bound for reliable unicast
pub const DEFAULT_MAX_RETRANSMISSIONS: u8 = 4;

/// Length of the kind prefix shared by all frames
pub const PREFIX_LEN: usize = 3;

/// Longest frame accepted by the codec
pub const MAX_FRAME_LEN: usize = 16;
