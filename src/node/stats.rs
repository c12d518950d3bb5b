use serde::Serialize;

use crate::core::{Error, LinkAddress, NodeId, NodeRole};
use crate::protocol::ConnectivityState;
use crate::routing::Route;
use super::engine::Disposition;

/// Counters kept by a running node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Reports relayed or originated towards the parent
    pub forwarded_up: u64,
    /// Commands relayed towards a child
    pub forwarded_down: u64,
    /// Frames handed to the local application
    pub delivered_local: u64,
    /// Summaries produced by the aggregation hook
    pub summaries: u64,
    pub announces_sent: u64,
    pub replies_sent: u64,
    pub parents_adopted: u64,
    pub routes_evicted: u64,
    pub routes_promoted: u64,
    /// Local deliveries lost to a full channel
    pub deliveries_dropped: u64,
    pub malformed_frames: u64,
    pub unknown_kinds: u64,
    pub resource_exhausted: u64,
    pub unknown_targets: u64,
    pub transport_timeouts: u64,
    pub not_connected: u64,
    pub other_errors: u64,
}

impl NodeStats {
    /// Counts a successfully handled frame or request
    pub fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::ForwardedUp(_) => self.forwarded_up += 1,
            Disposition::ForwardedDown(_) => self.forwarded_down += 1,
            Disposition::Delivered => self.delivered_local += 1,
            Disposition::Replied => self.replies_sent += 1,
            Disposition::ParentAdopted(_) => self.parents_adopted += 1,
            Disposition::Ignored => {}
        }
    }

    /// Counts a failed frame or request by error kind
    pub fn record_error(&mut self, error: &Error) {
        match error {
            Error::MalformedFrame(_) => self.malformed_frames += 1,
            Error::UnknownMessageKind(_) => self.unknown_kinds += 1,
            Error::ResourceExhausted(_) => self.resource_exhausted += 1,
            Error::UnknownTarget(_) => self.unknown_targets += 1,
            Error::TransportTimeout(_) => self.transport_timeouts += 1,
            Error::NotConnected => self.not_connected += 1,
            Error::Io(_) | Error::Config(_) | Error::ChannelClosed(_) => self.other_errors += 1,
        }
    }

    /// Total number of failures of any kind
    pub fn errors(&self) -> u64 {
        self.malformed_frames
            + self.unknown_kinds
            + self.resource_exhausted
            + self.unknown_targets
            + self.transport_timeouts
            + self.not_connected
            + self.other_errors
    }
}

/// Point-in-time snapshot of a node
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub id: NodeId,
    pub role: NodeRole,
    pub connectivity: ConnectivityState,
    /// Live routes in slot order
    pub routes: Vec<Route>,
    pub stats: NodeStats,
}

impl NodeStatus {
    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    pub fn parent(&self) -> Option<LinkAddress> {
        self.connectivity.parent()
    }

    pub fn route(&self, target: NodeId) -> Option<&Route> {
        self.routes.iter().find(|route| route.target() == target)
    }
}
