//! Network module
//!
//! This module wraps the external radio primitive: the [RadioLink] seam, the reliable unicast
//! adapter, parent discovery and an in-memory medium for simulations.

mod discovery;
mod link;
pub mod medium;
mod transport;

pub use self::discovery::Discovery;
pub use self::link::{Channel, InboundFrame, LinkStatus, RadioLink};
#[cfg(test)]
pub use self::link::MockRadioLink;
pub use self::medium::{MediumLink, RadioMedium};
pub use self::transport::{ReliableTransport, SendOutcome};
