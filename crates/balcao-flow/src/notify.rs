//! # Notification Hub
//!
//! Fire-and-forget broadcast of workflow transitions.
//!
//! ## Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Notification Hub                                   │
//! │                                                                         │
//! │  FlowService ──publish()──▶ broadcast::Sender                           │
//! │                                   │                                     │
//! │                 ┌─────────────────┼─────────────────┐                   │
//! │                 ▼                 ▼                 ▼                   │
//! │           manager view      finance view      (lagging sub:            │
//! │           (subscriber)      (subscriber)       drops oldest)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notifications are advisory. The timeline is the durable record; a missed
//! notification loses nothing. `publish` therefore never blocks and treats
//! "no receivers" as success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use balcao_core::FlowStatus;

/// Default buffer size for the broadcast channel.
///
/// A slow subscriber more than this many events behind starts losing the
/// oldest ones (`RecvError::Lagged`), which is acceptable for advisory
/// notifications.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A workflow transition event, published after the transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowNotification {
    pub sale_id: String,
    pub sale_number: i64,
    pub from: FlowStatus,
    pub to: FlowStatus,
    pub actor_name: String,
    pub at: DateTime<Utc>,
}

/// Broadcast hub for workflow notifications.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<FlowNotification>,
}

impl NotificationHub {
    /// Creates a hub with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a hub with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        NotificationHub { sender }
    }

    /// Subscribes to workflow notifications.
    ///
    /// Each subscriber gets every event published after it subscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<FlowNotification> {
        self.sender.subscribe()
    }

    /// Publishes a notification. Never blocks; a send with no subscribers
    /// is not an error.
    pub fn publish(&self, notification: FlowNotification) {
        debug!(
            sale_id = %notification.sale_id,
            from = ?notification.from,
            to = ?notification.to,
            "Publishing flow notification"
        );

        // Err here only means nobody is listening right now
        let _ = self.sender.send(notification);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(to: FlowStatus) -> FlowNotification {
        FlowNotification {
            sale_id: "s1".to_string(),
            sale_number: 1,
            from: FlowStatus::AwaitingReview,
            to,
            actor_name: "Pedro".to_string(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe();

        hub.publish(sample(FlowStatus::ManagerReview));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.to, FlowStatus::ManagerReview);
        assert_eq!(event.actor_name, "Pedro");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let hub = NotificationHub::new();
        assert_eq!(hub.subscriber_count(), 0);

        // Must not panic or block
        hub.publish(sample(FlowStatus::ManagerReview));
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_each_event() {
        let hub = NotificationHub::new();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(sample(FlowStatus::FinanceReview));

        assert_eq!(rx1.recv().await.unwrap().to, FlowStatus::FinanceReview);
        assert_eq!(rx2.recv().await.unwrap().to, FlowStatus::FinanceReview);
    }
}
