use bytes::Bytes;
use tracing::{trace, warn};

use crate::core::LinkAddress;
use crate::protocol::{FrameCodec, Message};
use super::link::{LinkStatus, RadioLink};

/// Outcome of a reliable send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    TimedOut,
}

/// Reliable delivery on top of the radio's unicast primitive
///
/// Retransmission happens in the link layer, bounded by `max_retransmissions`; a final failure
/// is reported exactly once as [SendOutcome::TimedOut] and never retried here.
pub struct ReliableTransport {
    link: Box<dyn RadioLink>,
    max_retransmissions: u8,
}

impl ReliableTransport {
    /// Creates a transport adapter over the given radio
    pub fn new(link: Box<dyn RadioLink>, max_retransmissions: u8) -> Self {
        ReliableTransport {
            link,
            max_retransmissions,
        }
    }

    /// Link address of the underlying radio
    pub fn local_address(&self) -> LinkAddress {
        self.link.local_address()
    }

    /// Encodes and sends a message to one neighbour
    pub async fn send(&self, message: &Message, to: LinkAddress) -> SendOutcome {
        self.send_frame(FrameCodec::encode_frame(message), to).await
    }

    /// Sends an already encoded frame to one neighbour
    pub async fn send_frame(&self, frame: Bytes, to: LinkAddress) -> SendOutcome {
        trace!(?to, ?frame, "unicast");
        match self.link.unicast(to, frame, self.max_retransmissions).await {
            LinkStatus::Acked => SendOutcome::Delivered,
            LinkStatus::TimedOut => {
                warn!(
                    "no acknowledgement from {} after {} retransmissions",
                    to, self.max_retransmissions
                );
                SendOutcome::TimedOut
            }
        }
    }

    /// Broadcasts a message; there is no delivery confirmation
    pub async fn broadcast(&self, message: &Message) {
        let frame = FrameCodec::encode_frame(message);
        trace!(?frame, "broadcast");
        self.link.broadcast(frame).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeId;
    use crate::network::link::MockRadioLink;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_delivered() {
        let mut link = MockRadioLink::new();
        link.expect_unicast()
            .with(eq(LinkAddress(3)), eq(Bytes::from_static(b"NDR7")), eq(4))
            .times(1)
            .returning(|_, _, _| LinkStatus::Acked);

        let transport = ReliableTransport::new(Box::new(link), 4);
        let outcome = transport
            .send(&Message::AnnounceReply { recipient: NodeId(7) }, LinkAddress(3))
            .await;
        assert_eq!(outcome, SendOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_timeout_reported_once() {
        let mut link = MockRadioLink::new();
        link.expect_unicast()
            .with(eq(LinkAddress(9)), eq(Bytes::from_static(b"SRV0742")), eq(2))
            .times(1)
            .returning(|_, _, _| LinkStatus::TimedOut);

        let transport = ReliableTransport::new(Box::new(link), 2);
        let outcome = transport
            .send_frame(Bytes::from_static(b"SRV0742"), LinkAddress(9))
            .await;
        assert_eq!(outcome, SendOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_broadcast_encodes() {
        let mut link = MockRadioLink::new();
        link.expect_broadcast()
            .with(eq(Bytes::from_static(b"NDA")))
            .times(1)
            .returning(|_| ());

        let transport = ReliableTransport::new(Box::new(link), 4);
        transport.broadcast(&Message::Announce).await;
    }
}
