use crate::core::{Error, NodeId, Reading, Result};

/// Index of an [AggregationEntry] inside its [AggregationPool]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// Bounded, oldest-first history of one child's readings
#[derive(Debug, Clone)]
pub struct AggregationEntry {
    owner: NodeId,
    history: Vec<Reading>,
    capacity: usize,
}

impl AggregationEntry {
    fn new(owner: NodeId, capacity: usize) -> Self {
        AggregationEntry {
            owner,
            history: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Buffered readings, oldest first
    pub fn history(&self) -> &[Reading] {
        &self.history
    }

    pub fn count(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.history.len() >= self.capacity
    }

    /// Appends a reading, returning the oldest one if it had to make room
    ///
    /// A zero capacity entry keeps nothing and drops `value`.
    pub fn push(&mut self, value: Reading) -> Option<Reading> {
        if self.capacity == 0 {
            return None;
        }
        if !self.is_full() {
            self.history.push(value);
            return None;
        }

        let evicted = self.history[0];
        self.history.copy_within(1.., 0);
        let newest = self.history.len() - 1;
        self.history[newest] = value;
        Some(evicted)
    }
}

/// Fixed number of aggregation slots, reused through a free list
#[derive(Debug)]
pub struct AggregationPool {
    slots: Vec<Option<AggregationEntry>>,
    free: Vec<usize>,
    depth: usize,
}

impl AggregationPool {
    /// Creates a pool of `max_entries` slots, each holding `depth` readings
    pub fn new(max_entries: usize, depth: usize) -> Self {
        AggregationPool {
            slots: (0..max_entries).map(|_| None).collect(),
            // lowest index is handed out first
            free: (0..max_entries).rev().collect(),
            depth,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn has_free_slot(&self) -> bool {
        !self.free.is_empty()
    }

    /// Claims a slot for `owner`
    pub fn allocate(&mut self, owner: NodeId) -> Result<BufferId> {
        let index = self.free.pop().ok_or_else(|| {
            Error::exhausted(format!("all {} aggregation slots are in use", self.slots.len()))
        })?;
        debug_assert!(self.slots[index].is_none());
        self.slots[index] = Some(AggregationEntry::new(owner, self.depth));
        Ok(BufferId(index))
    }

    /// Frees a slot, returning the entry it held
    pub fn release(&mut self, id: BufferId) -> Option<AggregationEntry> {
        let entry = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(entry)
    }

    pub fn get(&self, id: BufferId) -> Option<&AggregationEntry> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut AggregationEntry> {
        self.slots.get_mut(id.0)?.as_mut()
    }
}

/// Local summary computation over a full history
///
/// Invoked whenever a child's history is at capacity after a new reading. Returning a value
/// replaces the raw relay of that reading with a summary report on the child's behalf; returning
/// `None` keeps relaying raw readings.
pub trait AggregationHook: Send {
    fn summarize(&mut self, owner: NodeId, history: &[Reading]) -> Option<Reading>;
}

/// Hook that never summarizes: every reading is relayed upstream unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct RawForwarding;

impl AggregationHook for RawForwarding {
    fn summarize(&mut self, _owner: NodeId, _history: &[Reading]) -> Option<Reading> {
        None
    }
}

impl<F> AggregationHook for F
where
    F: FnMut(NodeId, &[Reading]) -> Option<Reading> + Send,
{
    fn summarize(&mut self, owner: NodeId, history: &[Reading]) -> Option<Reading> {
        self(owner, history)
    }
}
