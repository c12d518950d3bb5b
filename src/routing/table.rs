use std::collections::HashMap;

use tracing::{debug, info};

use crate::core::{Error, LinkAddress, NodeId, Reading, Result};
use super::aggregation::{AggregationEntry, AggregationPool, BufferId};

/// How traffic for a route's target is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteRole {
    /// Reports are relayed upstream unchanged
    PassThrough,
    /// Reports are buffered and may be summarized locally
    Aggregating,
    /// Promoted into a free aggregation slot, collecting history until the buffer fills
    Pending,
}

/// One known downstream node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    target: NodeId,
    next_hop: LinkAddress,
    age: u32,
    role: RouteRole,
    buffer: Option<BufferId>,
    /// Refreshed since the last sweep; the next sweep leaves the age at 0
    fresh: bool,
}

impl Route {
    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn next_hop(&self) -> LinkAddress {
        self.next_hop
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn role(&self) -> RouteRole {
        self.role
    }

    pub fn is_buffered(&self) -> bool {
        self.buffer.is_some()
    }
}

/// Result of buffering one reading for an aggregated route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingOutcome {
    /// Oldest reading dropped to make room
    pub evicted: Option<Reading>,
    /// History is at capacity after this reading
    pub full: bool,
    /// The route moved from `Pending` to `Aggregating`; only happens when a full history shifts
    pub confirmed: bool,
}

/// Routes removed and promoted by one [RoutingTable::age_sweep]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<NodeId>,
    pub promoted: Vec<NodeId>,
}

/// Forwarding table mapping downstream targets to next hops
///
/// Routes live in a fixed number of slots reused through a free list; aggregation buffers live in
/// an [AggregationPool] owned by the table so that a route and its buffer are always created and
/// destroyed together.
#[derive(Debug)]
pub struct RoutingTable {
    slots: Vec<Option<Route>>,
    free: Vec<usize>,
    index: HashMap<NodeId, usize>,
    pool: AggregationPool,
    inactivity_threshold: u32,
}

impl RoutingTable {
    /// Creates an empty table
    pub fn new(max_routes: usize, max_aggregating: usize, history_depth: usize, inactivity_threshold: u32) -> Self {
        RoutingTable {
            slots: (0..max_routes).map(|_| None).collect(),
            free: (0..max_routes).rev().collect(),
            index: HashMap::with_capacity(max_routes),
            pool: AggregationPool::new(max_aggregating, history_depth),
            inactivity_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of routes holding an aggregation buffer (`Aggregating` or `Pending`)
    pub fn buffered_count(&self) -> usize {
        self.pool.in_use()
    }

    pub fn get(&self, target: NodeId) -> Option<&Route> {
        let slot = *self.index.get(&target)?;
        self.slots[slot].as_ref()
    }

    /// All routes in slot order
    pub fn routes(&self) -> impl Iterator<Item = &Route> + '_ {
        self.slots.iter().flatten()
    }

    /// Aggregation buffer of a route, if it has one
    pub fn aggregation(&self, target: NodeId) -> Option<&AggregationEntry> {
        let buffer = self.get(target)?.buffer?;
        self.pool.get(buffer)
    }

    /// Refreshes the route for `origin`, or admits a new one
    ///
    /// A new route becomes `Aggregating` while an aggregation slot is free and `PassThrough`
    /// otherwise. Fails with [Error::ResourceExhausted] when every route slot is taken.
    pub fn lookup_or_create(&mut self, origin: NodeId, from: LinkAddress) -> Result<Route> {
        if let Some(&slot) = self.index.get(&origin) {
            if let Some(route) = self.slots[slot].as_mut() {
                if route.next_hop != from {
                    debug!("route to {} moved from {} to {}", origin, route.next_hop, from);
                }
                route.age = 0;
                route.next_hop = from;
                route.fresh = true;
                return Ok(*route);
            }
        }

        let slot = self.free.pop().ok_or_else(|| {
            Error::exhausted(format!(
                "routing table full ({} routes), cannot admit {}",
                self.slots.len(),
                origin
            ))
        })?;

        let (role, buffer) = if self.pool.has_free_slot() {
            (RouteRole::Aggregating, Some(self.pool.allocate(origin)?))
        } else {
            (RouteRole::PassThrough, None)
        };

        let route = Route {
            target: origin,
            next_hop: from,
            age: 0,
            role,
            buffer,
            fresh: true,
        };
        debug_assert!(!self.index.contains_key(&origin), "duplicate route for {}", origin);
        debug_assert!(self.slots[slot].is_none());
        self.slots[slot] = Some(route);
        self.index.insert(origin, slot);

        info!("new route to {} via {} ({:?})", origin, from, role);
        Ok(route)
    }

    /// Appends a reading to the buffer of `origin`; `None` when the route is not buffered
    pub fn record_reading(&mut self, origin: NodeId, value: Reading) -> Option<ReadingOutcome> {
        let slot = *self.index.get(&origin)?;
        let route = self.slots[slot].as_mut()?;
        let entry = self.pool.get_mut(route.buffer?)?;

        let evicted = entry.push(value);
        let full = entry.is_full();
        // a pending route is confirmed on the first shift of a full history
        let confirmed = evicted.is_some() && route.role == RouteRole::Pending;
        if confirmed {
            route.role = RouteRole::Aggregating;
            info!("{} overflowed its history and is now aggregating", origin);
        }

        Some(ReadingOutcome {
            evicted,
            full,
            confirmed,
        })
    }

    /// Ages every route by one frame and evicts the ones that reached the inactivity threshold
    ///
    /// Routes refreshed since the previous sweep keep age 0. Every aggregation slot freed by an
    /// eviction is handed to the first `PassThrough` route in slot order, which becomes `Pending`.
    pub fn age_sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();

        for slot in 0..self.slots.len() {
            let Some(route) = self.slots[slot].as_mut() else {
                continue;
            };
            if route.fresh {
                route.fresh = false;
                continue;
            }

            route.age = route.age.saturating_add(1);
            if route.age >= self.inactivity_threshold {
                let target = route.target;
                self.evict(slot);
                report.evicted.push(target);
            }
        }

        while self.pool.has_free_slot() {
            match self.promote_first_pass_through() {
                Some(target) => report.promoted.push(target),
                None => break,
            }
        }

        report
    }

    fn evict(&mut self, slot: usize) {
        let Some(route) = self.slots[slot].take() else {
            return;
        };
        self.index.remove(&route.target);
        self.free.push(slot);

        if let Some(buffer) = route.buffer {
            self.pool.release(buffer);
        }
        info!("evicted route to {} after {} silent frames ({:?})", route.target, route.age, route.role);
    }

    fn promote_first_pass_through(&mut self) -> Option<NodeId> {
        let route = self
            .slots
            .iter_mut()
            .flatten()
            .find(|route| route.role == RouteRole::PassThrough)?;

        let buffer = self.pool.allocate(route.target).ok()?;
        route.role = RouteRole::Pending;
        route.buffer = Some(buffer);
        info!("promoted {} to pending aggregation", route.target);
        Some(route.target)
    }
}
