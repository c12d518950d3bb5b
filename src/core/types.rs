use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Node identifier in the network
///
/// Assigned externally from the node's link-layer address and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u16);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<LinkAddress> for NodeId {
    fn from(addr: LinkAddress) -> Self {
        NodeId(addr.0)
    }
}

/// Address of an immediate radio neighbour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkAddress(pub u16);

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<NodeId> for LinkAddress {
    fn from(id: NodeId) -> Self {
        LinkAddress(id.0)
    }
}

/// Per-packet link quality reported by the radio (higher is better)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkQuality(pub i16);

/// A sensor reading, carried on the wire as exactly two decimal digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reading(u8);

impl Reading {
    /// Largest representable reading
    pub const MAX: u8 = 99;

    /// Creates a reading, rejecting values that do not fit two digits
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::malformed(format!("reading {} exceeds {}", value, Self::MAX)));
        }
        Ok(Reading(value))
    }

    /// Creates a reading, saturating at [Reading::MAX]
    pub fn saturating(value: u8) -> Self {
        Reading(value.min(Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// A downlink instruction code, carried on the wire as a single decimal digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order(u8);

impl Order {
    /// Largest representable order
    pub const MAX: u8 = 9;

    /// Creates an order, rejecting values that do not fit one digit
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::malformed(format!("order {} exceeds {}", value, Self::MAX)));
        }
        Ok(Order(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compiled-in behaviour of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Plain leaf: produces readings and relays children's traffic unchanged
    Sensor,
    /// Relay that buffers a bounded window of readings from some children
    Aggregator,
    /// Tree root: always connected, collects reports and originates commands
    Border,
}

/// Configuration for a canopy node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Role of this node
    pub role: NodeRole,
    /// Retry bound handed to the link layer for every unicast
    pub max_retransmissions: u8,
    /// Number of unrelated unicast frames after which a silent route is evicted
    pub inactivity_threshold: u32,
    /// Capacity of the routing table
    pub max_routes: usize,
    /// Maximum number of concurrently buffered children
    pub max_aggregating: usize,
    /// Readings kept per buffered child
    pub history_depth: usize,
    /// Lower bound of the jittered discovery interval
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub discovery_interval_min: Duration,
    /// Upper bound of the jittered discovery interval
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub discovery_interval_max: Duration,
    /// Interval between own readings (sensor nodes only)
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub report_interval: Duration,
    /// Upper bound of the random delay before the first own reading
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub startup_delay_max: Duration,
    /// Capacity of the local delivery channel
    pub delivery_queue: usize,
    /// Seed for the node's random generator; entropy when absent
    pub rng_seed: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            role: NodeRole::Aggregator,
            max_retransmissions: super::DEFAULT_MAX_RETRANSMISSIONS,
            inactivity_threshold: 20,
            max_routes: 10,
            max_aggregating: 2,
            history_depth: 5,
            discovery_interval_min: Duration::from_secs(4),
            discovery_interval_max: Duration::from_secs(8),
            report_interval: Duration::from_secs(60),
            startup_delay_max: Duration::from_secs(60),
            delivery_queue: 32,
            rng_seed: None,
        }
    }
}

impl NodeConfig {
    /// Default configuration for the given role
    pub fn for_role(role: NodeRole) -> Self {
        let max_aggregating = match role {
            NodeRole::Aggregator => 2,
            NodeRole::Sensor | NodeRole::Border => 0,
        };
        NodeConfig {
            role,
            max_aggregating,
            ..Default::default()
        }
    }

    /// Checks the configuration for values the protocol cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.history_depth == 0 {
            return Err(Error::config("history_depth must be at least 1"));
        }
        if self.inactivity_threshold == 0 {
            return Err(Error::config("inactivity_threshold must be at least 1"));
        }
        if self.max_routes == 0 {
            return Err(Error::config("max_routes must be at least 1"));
        }
        if self.max_aggregating > self.max_routes {
            return Err(Error::config(format!(
                "max_aggregating ({}) exceeds max_routes ({})",
                self.max_aggregating, self.max_routes
            )));
        }
        if self.discovery_interval_min > self.discovery_interval_max {
            return Err(Error::config("discovery_interval_min exceeds discovery_interval_max"));
        }
        if self.delivery_queue == 0 {
            return Err(Error::config("delivery_queue must be at least 1"));
        }
        if self.report_interval.is_zero() {
            return Err(Error::config("report_interval must be positive"));
        }
        Ok(())
    }
}
