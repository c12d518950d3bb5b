use crate::core::LinkAddress;

/// Connectivity of a node towards the border node
///
/// Owned by [crate::network::Discovery]; every other component only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// No parent and no probe sent yet (initial state, and after a transport timeout)
    Disconnected,

    /// Probing for a parent
    ///
    /// The best reply quality of the round is tracked by [crate::network::Discovery::best_quality].
    Discovering {
        /// Announces broadcast during this discovery round
        probes_sent: u32,
    },

    /// Reports can be relayed upstream through `parent`
    Connected {
        /// Current next hop towards the border node
        parent: LinkAddress,
    },

    /// This node is the border node: permanently connected, without a parent
    Root,
}

impl ConnectivityState {
    /// Whether this node may sponsor children by answering announces
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityState::Connected { .. } | ConnectivityState::Root)
    }

    /// Current next hop towards the border node, if any
    pub fn parent(&self) -> Option<LinkAddress> {
        match self {
            ConnectivityState::Connected { parent } => Some(*parent),
            _ => None,
        }
    }

    /// Short name for status output
    pub fn name(&self) -> &'static str {
        match self {
            ConnectivityState::Disconnected => "Disconnected",
            ConnectivityState::Discovering { .. } => "Discovering",
            ConnectivityState::Connected { .. } => "Connected",
            ConnectivityState::Root => "Root",
        }
    }
}
