//! Scheduled port writes and the time-ordered queue that holds them.
//!
//! Events are the only way a component's output reaches the rest of the
//! circuit. The queue orders them by fire time and, within one fire time,
//! by insertion order, which keeps simulation output reproducible.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::types::{ComponentId, PortRef, SimTime};
use crate::value::Value;

/// A scheduled future write of a value onto one port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Absolute time at which the write takes effect
    pub time: SimTime,
    /// Insertion sequence number, the tie-break within one time
    pub seq: u64,
    /// The driving port being written
    pub target: PortRef,
    /// The value to drive
    pub value: Value,
    /// Component whose propagation caused the write; `None` for stimuli
    pub cause: Option<ComponentId>,
}

impl Event {
    /// Returns true if the event was injected from outside the circuit.
    pub fn is_stimulus(&self) -> bool {
        self.cause.is_none()
    }
}

impl Ord for Event {
    // Reversed so the max-heap pops the earliest (time, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending events, earliest first, FIFO within equal times.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Event>,
    next_seq: u64,
    peak_len: usize,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a write and returns its sequence number.
    pub fn push(
        &mut self,
        time: SimTime,
        target: PortRef,
        value: Value,
        cause: Option<ComponentId>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Event { time, seq, target, value, cause });
        self.peak_len = self.peak_len.max(self.heap.len());
        seq
    }

    /// Fire time of the earliest pending event.
    pub fn next_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.time)
    }

    /// Removes every event scheduled at the earliest pending time, in
    /// insertion order.
    pub fn pop_earliest(&mut self) -> Vec<Event> {
        let Some(time) = self.next_time() else {
            return Vec::new();
        };
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|e| e.time == time) {
            if let Some(event) = self.heap.pop() {
                due.push(event);
            }
        }
        due
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Largest number of events pending at once since creation.
    pub fn peak_len(&self) -> usize {
        self.peak_len
    }

    /// Discards every pending event.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
