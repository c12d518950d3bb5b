//! Node module
//!
//! This module ties the protocol pieces together into a running node: the forwarding engine that
//! handles every frame, the runtime loop with its discovery and report timers, and the counters
//! and snapshots exposed to the application.

mod engine;
mod runtime;
mod sensor;
mod stats;

pub use self::engine::{Delivery, Disposition, ForwardingEngine, NodeContext};
pub use self::runtime::{Node, NodeHandle};
pub use self::sensor::{RandomSensor, SensorSource};
pub use self::stats::{NodeStats, NodeStatus};
