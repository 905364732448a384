//! Broadcast bus for a session's `SessionEvent`s.
//!
//! Publishing with no active subscribers is a no-op; slow subscribers lag
//! and skip rather than stall the tick loop.

use colloquy_types::event::SessionEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(SessionEvent::TickStarted { tick: 3 });

        assert!(matches!(rx1.recv().await.unwrap(), SessionEvent::TickStarted { tick: 3 }));
        assert!(matches!(rx2.recv().await.unwrap(), SessionEvent::TickStarted { tick: 3 }));
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new(16);
        bus.publish(SessionEvent::Stopped { tick: 0 });
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn lagged_receiver_skips_ahead() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        for tick in 0..10 {
            bus.publish(SessionEvent::TickStarted { tick });
        }
        match rx.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.clone().publish(SessionEvent::TickStarted { tick: 1 });
        assert!(rx.try_recv().is_ok());
        assert!(format!("{bus:?}").contains("receiver_count"));
    }
}
