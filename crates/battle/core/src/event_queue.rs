//! Frame-keyed queue of delayed intents.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::intent::Intent;
use crate::types::Frame;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduledEvent {
    pub frame: Frame,
    /// Lower runs first among events due on the same frame.
    pub priority: i32,
    pub payload: Intent,
    seq: u64,
}

impl ScheduledEvent {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    fn key(&self) -> (Frame, i32, u64) {
        (self.frame, self.priority, self.seq)
    }
}

impl Eq for ScheduledEvent {}

// Reversed so the max-heap pops the smallest key.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Events ordered by frame, then priority, then insertion.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, frame: Frame, priority: i32, payload: Intent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEvent {
            frame,
            priority,
            payload,
            seq,
        });
    }

    /// Removes and returns every event with `event.frame <= current`, in
    /// queue order.
    pub fn pop_due(&mut self, current: Frame) -> Vec<ScheduledEvent> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|event| event.frame <= current) {
            if let Some(event) = self.heap.pop() {
                due.push(event);
            }
        }
        due
    }

    pub fn peek_frame(&self) -> Option<Frame> {
        self.heap.peek().map(|event| event.frame)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
