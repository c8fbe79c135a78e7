//! Topic-based event bus implementation.

use battle_core::RenderCommand;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::types::{FrameEvent, IntentEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Frame boundaries
    Frame,
    /// Render commands for the presentation layer
    Render,
    /// Per-intent commit results
    Intent,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Frame, Topic::Render, Topic::Intent];
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Frame(FrameEvent),
    Render(RenderCommand),
    Intent(IntentEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Frame(_) => Topic::Frame,
            Event::Render(_) => Topic::Render,
            Event::Intent(_) => Topic::Intent,
        }
    }
}

/// Topic-based event bus
///
/// One broadcast channel per topic, created up front. Clones share the
/// channels.
#[derive(Clone)]
pub struct EventBus {
    frame: broadcast::Sender<Event>,
    render: broadcast::Sender<Event>,
    intent: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frame: broadcast::channel(capacity).0,
            render: broadcast::channel(capacity).0,
            intent: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Frame => &self.frame,
            Topic::Render => &self.render,
            Topic::Intent => &self.intent,
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!(target: "runtime::events", ?topic, "no subscribers");
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
