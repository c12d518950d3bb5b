use tracing::{debug, info, warn};

use crate::core::{LinkAddress, LinkQuality, NodeId};
use crate::protocol::{ConnectivityState, Message};

/// Parent discovery and selection
///
/// Greedy and monotonic within a discovery round: a reply only replaces the current parent when
/// its measured link quality is strictly better than the best seen so far. A transport timeout
/// ends the round and resets the accumulator.
#[derive(Debug)]
pub struct Discovery {
    node_id: NodeId,
    state: ConnectivityState,
    best_quality: Option<LinkQuality>,
}

impl Discovery {
    /// Creates discovery for a node that still has to find its parent
    pub fn new(node_id: NodeId) -> Self {
        Discovery {
            node_id,
            state: ConnectivityState::Disconnected,
            best_quality: None,
        }
    }

    /// Creates discovery for the border node, which is connected by definition
    pub fn new_root(node_id: NodeId) -> Self {
        Discovery {
            node_id,
            state: ConnectivityState::Root,
            best_quality: None,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn parent(&self) -> Option<LinkAddress> {
        self.state.parent()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Best link quality accepted in the current discovery round
    pub fn best_quality(&self) -> Option<LinkQuality> {
        self.best_quality
    }

    /// Called on every discovery timer expiry; returns the probe to broadcast, if any
    pub fn on_timer(&mut self) -> Option<Message> {
        match self.state {
            ConnectivityState::Disconnected => {
                self.state = ConnectivityState::Discovering { probes_sent: 1 };
            }
            ConnectivityState::Discovering { probes_sent } => {
                self.state = ConnectivityState::Discovering {
                    probes_sent: probes_sent.saturating_add(1),
                };
            }
            ConnectivityState::Connected { .. } | ConnectivityState::Root => return None,
        }
        debug!(node = %self.node_id, state = ?self.state, "broadcasting announce");
        Some(Message::Announce)
    }

    /// Handles a probe from `from`; only connected nodes answer
    pub fn on_announce(&self, from: LinkAddress) -> Option<Message> {
        if !self.is_connected() {
            debug!(node = %self.node_id, "ignoring announce from {} while not connected", from);
            return None;
        }
        Some(Message::AnnounceReply {
            recipient: NodeId::from(from),
        })
    }

    /// Handles a discovery answer, returning whether `from` was adopted as the new parent
    pub fn on_announce_reply(&mut self, recipient: NodeId, from: LinkAddress, quality: LinkQuality) -> bool {
        if recipient != self.node_id {
            return false;
        }
        if self.state == ConnectivityState::Root {
            debug!(node = %self.node_id, "border node ignores announce reply from {}", from);
            return false;
        }

        match self.best_quality {
            Some(best) if quality <= best => {
                debug!(
                    node = %self.node_id,
                    "reply from {} with quality {} is not better than {}",
                    from, quality.0, best.0
                );
                false
            }
            _ => {
                info!(
                    node = %self.node_id,
                    "adopting {} as parent (quality {}, previous best {:?})",
                    from, quality.0, self.best_quality.map(|q| q.0)
                );
                self.best_quality = Some(quality);
                self.state = ConnectivityState::Connected { parent: from };
                true
            }
        }
    }

    /// Handles an exhausted retry budget towards the parent
    pub fn on_transport_timeout(&mut self) {
        if self.state == ConnectivityState::Root {
            return;
        }
        warn!(node = %self.node_id, "lost parent {:?}, restarting discovery", self.parent());
        self.state = ConnectivityState::Disconnected;
        self.best_quality = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(discovery: &mut Discovery, parent: u16, quality: i16) {
        assert!(discovery.on_announce_reply(NodeId(1), LinkAddress(parent), LinkQuality(quality)));
    }

    #[test]
    fn test_probe_until_connected() {
        let mut discovery = Discovery::new(NodeId(1));
        assert_eq!(discovery.on_timer(), Some(Message::Announce));
        assert_eq!(discovery.state(), ConnectivityState::Discovering { probes_sent: 1 });
        assert_eq!(discovery.on_timer(), Some(Message::Announce));
        assert_eq!(discovery.state(), ConnectivityState::Discovering { probes_sent: 2 });

        connected(&mut discovery, 5, 10);
        assert_eq!(discovery.parent(), Some(LinkAddress(5)));
        assert_eq!(discovery.on_timer(), None);
    }

    #[test]
    fn test_only_connected_nodes_answer() {
        let mut discovery = Discovery::new(NodeId(1));
        assert_eq!(discovery.on_announce(LinkAddress(9)), None);
        discovery.on_timer();
        assert_eq!(discovery.on_announce(LinkAddress(9)), None);

        connected(&mut discovery, 5, 10);
        assert_eq!(
            discovery.on_announce(LinkAddress(9)),
            Some(Message::AnnounceReply { recipient: NodeId(9) })
        );

        let root = Discovery::new_root(NodeId(0));
        assert!(root.on_announce(LinkAddress(9)).is_some());
    }

    #[test]
    fn test_reply_for_other_node_ignored() {
        let mut discovery = Discovery::new(NodeId(1));
        assert!(!discovery.on_announce_reply(NodeId(2), LinkAddress(5), LinkQuality(10)));
        assert_eq!(discovery.state(), ConnectivityState::Disconnected);
    }

    #[test]
    fn test_monotonic_parent_selection() {
        let mut discovery = Discovery::new(NodeId(1));
        connected(&mut discovery, 5, 10);

        // equal quality keeps the parent
        assert!(!discovery.on_announce_reply(NodeId(1), LinkAddress(6), LinkQuality(10)));
        // lower quality keeps the parent
        assert!(!discovery.on_announce_reply(NodeId(1), LinkAddress(7), LinkQuality(-20)));
        assert_eq!(discovery.parent(), Some(LinkAddress(5)));

        // strictly better wins
        connected(&mut discovery, 8, 11);
        assert_eq!(discovery.parent(), Some(LinkAddress(8)));
        assert_eq!(discovery.best_quality(), Some(LinkQuality(11)));
    }

    #[test]
    fn test_timeout_resets_round() {
        let mut discovery = Discovery::new(NodeId(1));
        connected(&mut discovery, 5, 40);

        discovery.on_transport_timeout();
        assert_eq!(discovery.state(), ConnectivityState::Disconnected);
        assert_eq!(discovery.best_quality(), None);

        // a weaker parent is acceptable in the new round
        connected(&mut discovery, 6, -30);
        assert_eq!(discovery.parent(), Some(LinkAddress(6)));
    }

    #[test]
    fn test_root_is_permanent() {
        let mut root = Discovery::new_root(NodeId(0));
        assert_eq!(root.on_timer(), None);
        assert!(!root.on_announce_reply(NodeId(0), LinkAddress(3), LinkQuality(50)));
        root.on_transport_timeout();
        assert_eq!(root.state(), ConnectivityState::Root);
    }
}
