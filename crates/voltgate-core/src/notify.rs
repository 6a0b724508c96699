//! Notification delivery seam.
//!
//! Delivery is fire-and-forget: the automation engine reports rule results
//! and failures through here and never waits on, or fails because of, the
//! sink.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::NotificationPriority;

/// Outbound notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        priority: NotificationPriority,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority,
        }
    }
}

/// Delivery contract for outbound notifications.
pub trait NotificationSink: Send + Sync {
    fn deliver<'a>(
        &'a self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Sink that writes notifications to the log. High priority logs at warn
/// so it stands out under the default filter.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver<'a>(
        &'a self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            match notification.priority {
                NotificationPriority::High => warn!(
                    title = %notification.title,
                    message = %notification.message,
                    "notification"
                ),
                _ => info!(
                    title = %notification.title,
                    message = %notification.message,
                    priority = notification.priority.as_str(),
                    "notification"
                ),
            }
        })
    }
}

/// Capturing sink for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .expect("recording sink lock is not poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.delivered
            .lock()
            .expect("recording sink lock is not poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for RecordingSink {
    fn deliver<'a>(
        &'a self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.delivered
                .lock()
                .expect("recording sink lock is not poisoned")
                .push(notification);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_sink_captures_in_order() {
        let sink = RecordingSink::new();

        sink.deliver(Notification::new("first", "a", NotificationPriority::Low))
            .await;
        sink.deliver(Notification::new("second", "b", NotificationPriority::High))
            .await;

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].title, "first");
        assert_eq!(delivered[1].priority, NotificationPriority::High);
    }
}
