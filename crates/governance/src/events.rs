//! Outbound governance events
//!
//! Published on a broadcast channel for live consumers (UI refresh, the
//! daemon's event log). Publishing never blocks and never fails the
//! producing operation; absent or lagging subscribers are ignored.

use tokio::sync::broadcast;

use crate::{Ballot, MotionId, Outcome};

/// Events produced by the motion engine
#[derive(Debug, Clone)]
pub enum GovernanceEvent {
    /// A motion was created and is open for voting
    MotionCreated { motion_id: MotionId },

    /// A ballot landed; current aggregate counts
    TallyChanged {
        motion_id: MotionId,
        support: u32,
        oppose: u32,
        abstain: u32,
    },

    /// A motion was closed and archived
    MotionClosed {
        motion_id: MotionId,
        outcome: Outcome,
        reason: String,
        breakdown: Vec<Ballot>,
    },
}

/// Broadcast bus for governance events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GovernanceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GovernanceEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. A send error only means there are no subscribers.
    pub fn publish(&self, event: GovernanceEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(GovernanceEvent::MotionCreated { motion_id: 1 });

        match rx.recv().await.unwrap() {
            GovernanceEvent::MotionCreated { motion_id } => assert_eq!(motion_id, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new(8);
        bus.publish(GovernanceEvent::MotionCreated { motion_id: 1 });
    }
}
