//! Canopy: self-organising tree routing for wireless sensor nodes
//!
//! Nodes discover a parent by broadcasting probes and picking the best-quality answer, relay
//! sensor reports upstream to a border node, route commands back down along learned paths and
//! optionally buffer a bounded history of readings per child for local aggregation.

pub mod core;
pub mod network;
pub mod node;
pub mod protocol;
pub mod routing;
mod util;

// Re-export commonly used items
pub use crate::core::{Error, LinkAddress, LinkQuality, NodeConfig, NodeId, NodeRole, Order, Reading, Result};
pub use node::{Delivery, Node, NodeHandle, NodeStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::DEBUG)
            .try_init()
            .ok();
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
