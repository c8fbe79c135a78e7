use std::collections::VecDeque;

use crate::intent::Intent;

/// FIFO inbox for host-originated intents, drained at the start of each
/// step.
#[derive(Clone, Debug, Default)]
pub struct MessageRouter {
    inbox: VecDeque<Intent>,
    routed: u64,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, intent: Intent) {
        self.inbox.push_back(intent);
    }

    pub fn drain(&mut self) -> Vec<Intent> {
        self.routed += self.inbox.len() as u64;
        self.inbox.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inbox.is_empty()
    }

    /// Intents handed to the simulation so far.
    pub fn routed(&self) -> u64 {
        self.routed
    }

    /// Empties the inbox and resets the routed count.
    pub fn clear(&mut self) {
        self.inbox.clear();
        self.routed = 0;
    }
}
