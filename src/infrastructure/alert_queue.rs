//! Critical alert notification channel
//!
//! One unbounded queue per process. Producers (the recorder) never block;
//! the consumer, e.g. a live-alert pusher, lives elsewhere.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[display("New alert detected: {timestamp}")]
pub struct CriticalAlertNotification {
    /// Timestamp of the recorded alert
    pub timestamp: DateTime<Utc>,
}

pub type AlertReceiver = mpsc::UnboundedReceiver<CriticalAlertNotification>;

/// Producer side of the critical alert queue
#[derive(Debug, Clone)]
pub struct AlertQueue {
    tx: mpsc::UnboundedSender<CriticalAlertNotification>,
}

/// Create the process-wide critical alert queue
pub fn alert_queue() -> (AlertQueue, AlertReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AlertQueue { tx }, rx)
}

impl AlertQueue {
    pub fn notify(&self, timestamp: DateTime<Utc>) {
        let notification = CriticalAlertNotification { timestamp };
        if self.tx.send(notification).is_err() {
            warn!(%notification, "Critical alert queue has no consumer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notifications_arrive_in_push_order() {
        let (queue, mut rx) = alert_queue();
        let t1 = Utc::now();
        let t2 = t1 + chrono::TimeDelta::seconds(1);

        queue.clone().notify(t1);
        queue.notify(t2);

        assert_eq!(rx.recv().await.unwrap().timestamp, t1);
        assert_eq!(rx.recv().await.unwrap().timestamp, t2);
    }

    #[test]
    fn test_receiver_waits_until_notified() {
        let (queue, mut rx) = alert_queue();
        let timestamp = Utc::now();
        let mut recv = tokio_test::task::spawn(rx.recv());

        tokio_test::assert_pending!(recv.poll());
        queue.notify(timestamp);

        assert!(recv.is_woken());
        let notification = tokio_test::assert_ready!(recv.poll());
        assert_eq!(notification.map(|n| n.timestamp), Some(timestamp));
    }

    #[test]
    fn test_notify_without_consumer_does_not_panic() {
        let (queue, rx) = alert_queue();
        drop(rx);
        queue.notify(Utc::now());
    }

    #[test]
    fn test_notification_display_names_timestamp() {
        let timestamp = Utc::now();
        let text = CriticalAlertNotification { timestamp }.to_string();
        assert_eq!(text, format!("New alert detected: {timestamp}"));
    }
}
