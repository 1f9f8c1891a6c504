//! Publication lifecycle events
//!
//! A typed publish/subscribe channel for components that want to react to
//! a load cycle (chrome, bookmark stores) without being called directly.
//! The assembler only publishes; nothing in a load cycle waits on a
//! subscriber.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 64;

/// Events emitted during a load cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublicationEvent {
    /// A load cycle started
    LoadStarted { cycle_id: Uuid, title: String },
    /// Both fragment joins completed
    ResourcesResolved {
        cycle_id: Uuid,
        pages: usize,
        stylesheets: usize,
    },
    /// A rewritten page was handed to the layout
    PageAdded {
        cycle_id: Uuid,
        id: String,
        file: String,
    },
    /// The layout was finalised
    PublicationLoaded { cycle_id: Uuid, pages: usize },
    /// The load cycle failed
    LoadFailed { cycle_id: Uuid, reason: String },
}

/// Broadcast bus for [`PublicationEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PublicationEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a subscriber. Dropping the subscription unsubscribes it.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Explicitly end a subscription
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Deliver an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it; publishing with
    /// no subscribers is not an error.
    pub fn publish(&self, event: PublicationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Handle held by one subscriber
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<PublicationEvent>,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the bus is gone. Events missed because the
    /// subscriber fell behind are skipped.
    pub async fn recv(&mut self) -> Option<PublicationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<PublicationEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
