//! Post-send notifications.
//!
//! Events are emitted once a send result is final; delivery of the events
//! (webhooks) happens on a separate task and never feeds back into results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};

/// Something observable happened on the send path
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MailEvent {
    EmailSent {
        recipients: Vec<String>,
        subject: String,
        message_id: String,
        config_id: String,
        at: DateTime<Utc>,
    },
    EmailFailed {
        recipients: Vec<String>,
        subject: String,
        error: String,
        at: DateTime<Utc>,
    },
    BulkCompleted {
        total_sent: usize,
        total_failed: usize,
        at: DateTime<Utc>,
    },
}

/// Sending half of the event channel.
///
/// The queue is bounded; when the dispatcher falls behind, new events are
/// dropped with a warning instead of blocking the send path.
#[derive(Clone, Debug)]
pub struct EventSink {
    sender: Option<mpsc::Sender<MailEvent>>,
}

impl EventSink {
    pub fn new(sender: mpsc::Sender<MailEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Sink that drops every event
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: MailEvent) {
        let Some(sender) = &self.sender else {
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(?event, "Event queue full, dropping mail event");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Event receiver closed, dropping mail event");
            }
        }
    }
}

/// Consumes mail events and forwards them to a webhook, if one is set
pub struct WebhookDispatcher {
    client: Client,
    url: Option<String>,
    capacity: usize,
}

impl WebhookDispatcher {
    pub fn new(url: Option<String>, timeout: Duration, capacity: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Webhook(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self {
            client,
            url,
            capacity: capacity.max(1),
        })
    }

    /// Spawn the dispatcher; returns the sink to hand to the send path
    pub fn spawn(self) -> (EventSink, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let handle = tokio::spawn(self.run(rx));
        (EventSink::new(tx), handle)
    }

    async fn run(self, mut rx: mpsc::Receiver<MailEvent>) {
        while let Some(event) = rx.recv().await {
            match &self.url {
                Some(url) => {
                    if let Err(e) = self.post(url, &event).await {
                        tracing::warn!(error = %e, "Webhook delivery failed, event dropped");
                    }
                }
                None => tracing::debug!(?event, "Mail event"),
            }
        }
    }

    async fn post(&self, url: &str, event: &MailEvent) -> Result<()> {
        let res = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::Webhook(format!("Webhook request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Webhook(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sink = EventSink::new(tx);

        sink.emit(MailEvent::BulkCompleted {
            total_sent: 1,
            total_failed: 0,
            at: Utc::now(),
        });
        sink.emit(MailEvent::BulkCompleted {
            total_sent: 2,
            total_failed: 1,
            at: Utc::now(),
        });

        match rx.recv().await {
            Some(MailEvent::BulkCompleted { total_sent, .. }) => assert_eq!(total_sent, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await {
            Some(MailEvent::BulkCompleted { total_failed, .. }) => assert_eq!(total_failed, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        EventSink::new(tx).emit(MailEvent::BulkCompleted {
            total_sent: 0,
            total_failed: 0,
            at: Utc::now(),
        });
        EventSink::disabled().emit(MailEvent::BulkCompleted {
            total_sent: 0,
            total_failed: 0,
            at: Utc::now(),
        });
    }

    #[test]
    fn test_event_json_is_tagged() {
        let value = serde_json::to_value(MailEvent::EmailFailed {
            recipients: vec!["a@x.com".to_string()],
            subject: "S".to_string(),
            error: "boom".to_string(),
            at: Utc::now(),
        })
        .unwrap();

        assert_eq!(value["event"], "email_failed");
        assert_eq!(value["error"], "boom");
    }

    fn completed(total_sent: usize) -> MailEvent {
        MailEvent::BulkCompleted {
            total_sent,
            total_failed: 0,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);

        sink.emit(completed(1));
        sink.emit(completed(2));
        drop(sink);

        match rx.recv().await {
            Some(MailEvent::BulkCompleted { total_sent, .. }) => assert_eq!(total_sent, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_unresponsive_webhook_does_not_stall_dispatcher() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer them
        let _hold = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let dispatcher = WebhookDispatcher::new(
            Some(format!("http://{}/hook", addr)),
            Duration::from_millis(200),
            16,
        )
        .unwrap();
        let (sink, handle) = dispatcher.spawn();

        for n in 0..3 {
            sink.emit(completed(n));
        }
        drop(sink);

        let finished = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(finished.is_ok(), "dispatcher still waiting on the webhook");
    }
}
