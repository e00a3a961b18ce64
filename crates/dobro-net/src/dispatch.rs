//! Per-action fan-out of inbound messages.

use std::collections::HashMap;

use dobro_shared::protocol::{Action, Inbound};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};

/// Routes every inbound message to the subscribers registered for its
/// action.  A consumer that subscribes after a message was published
/// receives nothing and must re-request the data.
pub struct ActionBus {
    /// Live subscriber channels indexed by action.
    subscribers: RwLock<HashMap<Action, Vec<mpsc::UnboundedSender<Inbound>>>>,
}

impl ActionBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register for all future messages carrying `action`.
    pub async fn subscribe(&self, action: Action) -> mpsc::UnboundedReceiver<Inbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscribers.write().await;
        subs.entry(action).or_default().push(tx);
        rx
    }

    /// Register one receiver under several actions at once.
    pub async fn subscribe_many(&self, actions: &[Action]) -> mpsc::UnboundedReceiver<Inbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscribers.write().await;
        for action in actions {
            subs.entry(action.clone()).or_default().push(tx.clone());
        }
        rx
    }

    /// Deliver a message to every live subscriber for its action, pruning
    /// channels whose receivers are gone.  Returns how many received it.
    pub async fn publish(&self, message: Inbound) -> usize {
        let mut subs = self.subscribers.write().await;
        let Some(list) = subs.get_mut(&message.action) else {
            trace!(action = %message.action, "no subscribers for action");
            return 0;
        };
        let before = list.len();
        list.retain(|tx| tx.send(message.clone()).is_ok());
        let delivered = list.len();
        if delivered < before {
            debug!(
                action = %message.action,
                pruned = before - delivered,
                "pruned closed subscribers"
            );
        }
        if list.is_empty() {
            subs.remove(&message.action);
        }
        delivered
    }

    /// Number of live subscriber channels for an action.
    pub async fn subscriber_count(&self, action: &Action) -> usize {
        let subs = self.subscribers.read().await;
        subs.get(action).map_or(0, Vec::len)
    }
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn make_inbound(action: Action) -> Inbound {
        Inbound {
            topic: None,
            action,
            status: Some("success".to_string()),
            payload: Map::new(),
        }
    }

    #[tokio::test]
    async fn subscribe_then_publish_delivers() {
        let bus = ActionBus::new();
        let mut rx = bus.subscribe(Action::GetAllUsers).await;

        let delivered = bus.publish(make_inbound(Action::GetAllUsers)).await;
        assert_eq!(delivered, 1);

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.action, Action::GetAllUsers);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = ActionBus::new();
        // Should not panic
        let delivered = bus.publish(make_inbound(Action::CreateEvent)).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn actions_do_not_cross() {
        let bus = ActionBus::new();
        let mut events_rx = bus.subscribe(Action::GetUpcomingEvents).await;
        let mut users_rx = bus.subscribe(Action::GetAllUsers).await;

        bus.publish(make_inbound(Action::GetUpcomingEvents)).await;

        assert!(events_rx.try_recv().is_ok());
        assert!(users_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rapid_replies_for_different_actions_both_delivered() {
        let bus = ActionBus::new();
        let mut users_rx = bus.subscribe(Action::GetAllUsers).await;
        let mut events_rx = bus.subscribe(Action::GetUserEvents).await;

        // Back-to-back publishes must not overwrite each other
        bus.publish(make_inbound(Action::GetAllUsers)).await;
        bus.publish(make_inbound(Action::GetUserEvents)).await;

        assert_eq!(users_rx.try_recv().unwrap().action, Action::GetAllUsers);
        assert_eq!(events_rx.try_recv().unwrap().action, Action::GetUserEvents);
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let bus = ActionBus::new();
        let mut rx1 = bus.subscribe(Action::AddChatMessage).await;
        let mut rx2 = bus.subscribe(Action::AddChatMessage).await;

        let delivered = bus.publish(make_inbound(Action::AddChatMessage)).await;
        assert_eq!(delivered, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned() {
        let bus = ActionBus::new();
        let rx = bus.subscribe(Action::GetAllUsers).await;
        drop(rx);

        let delivered = bus.publish(make_inbound(Action::GetAllUsers)).await;
        assert_eq!(delivered, 0);
        assert_eq!(bus.subscriber_count(&Action::GetAllUsers).await, 0);
    }

    #[tokio::test]
    async fn subscribe_many_feeds_one_receiver() {
        let bus = ActionBus::new();
        let mut rx = bus
            .subscribe_many(&[Action::GetTaskComments, Action::AddTaskComment])
            .await;

        bus.publish(make_inbound(Action::GetTaskComments)).await;
        bus.publish(make_inbound(Action::AddTaskComment)).await;

        assert_eq!(rx.try_recv().unwrap().action, Action::GetTaskComments);
        assert_eq!(rx.try_recv().unwrap().action, Action::AddTaskComment);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_publish() {
        let bus = ActionBus::new();
        bus.publish(make_inbound(Action::GetAllUsers)).await;

        let mut rx = bus.subscribe(Action::GetAllUsers).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_actions_route_like_any_other() {
        let bus = ActionBus::new();
        let action = Action::Other("server_pong".to_string());
        let mut rx = bus.subscribe(action.clone()).await;

        bus.publish(make_inbound(action.clone())).await;
        assert_eq!(rx.try_recv().unwrap().action, action);
    }
}
