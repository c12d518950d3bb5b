use async_trait::async_trait;
use bytes::Bytes;

use crate::core::{LinkAddress, LinkQuality};

/// Logical conversation a frame travelled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Unacknowledged one-to-all traffic (discovery)
    Broadcast,
    /// Acknowledged, retried point-to-point traffic (reports and commands)
    Unicast,
}

/// A frame handed up by the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub channel: Channel,
    /// Immediate neighbour the frame was received from
    pub from: LinkAddress,
    /// Link quality measured by the radio for this packet
    pub quality: LinkQuality,
    pub payload: Bytes,
}

/// Final result of a retried unicast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Acked,
    TimedOut,
}

/// The radio primitive a node runs on
///
/// Implementations provide best-effort broadcast and acknowledged unicast with link-layer
/// retransmissions. Inbound frames are delivered separately through a channel of
/// [InboundFrame]s.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RadioLink: Send + Sync {
    /// Link address of this radio
    fn local_address(&self) -> LinkAddress;

    /// Sends a frame to every neighbour in range; silently lossy
    async fn broadcast(&self, frame: Bytes);

    /// Sends a frame to one neighbour, retransmitting up to `max_retransmissions` times
    async fn unicast(&self, to: LinkAddress, frame: Bytes, max_retransmissions: u8) -> LinkStatus;
}
