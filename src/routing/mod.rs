//! Routing module
//!
//! Downstream routes with traffic-paced liveness aging, and the bounded per-child reading
//! buffers used by aggregating relays.

pub mod aggregation;
pub mod table;

pub use self::aggregation::{AggregationEntry, AggregationHook, AggregationPool, RawForwarding};
pub use self::table::{ReadingOutcome, Route, RouteRole, RoutingTable, SweepReport};
