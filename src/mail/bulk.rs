//! Bulk sends: contiguous batches, each sent concurrently and awaited as a
//! whole, with a pause between batches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use crate::mail::events::{EventSink, MailEvent};
use crate::mail::sender::MailService;
use crate::mail::throttle::RateLimiter;
use crate::models::{BulkSendRequest, BulkSendResult, Recipient, RecipientFailure, RecipientResult};

/// Batching parameters used when a request leaves them out
#[derive(Debug, Clone, Copy)]
pub struct BulkDefaults {
    pub batch_size: usize,
    pub delay: Duration,
    pub max_batch_size: usize,
}

impl Default for BulkDefaults {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay: Duration::from_millis(1000),
            max_batch_size: 100,
        }
    }
}

#[derive(Clone)]
pub struct BulkSender {
    service: MailService,
    limiter: Arc<RateLimiter>,
    events: EventSink,
    defaults: BulkDefaults,
}

impl BulkSender {
    pub fn new(
        service: MailService,
        limiter: Arc<RateLimiter>,
        events: EventSink,
        defaults: BulkDefaults,
    ) -> Self {
        Self {
            service,
            limiter,
            events,
            defaults,
        }
    }

    fn batch_size(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|size| *size > 0)
            .unwrap_or(self.defaults.batch_size)
            .min(self.defaults.max_batch_size.max(1))
            .max(1)
    }

    /// Send to every recipient; one failure never stops the rest.
    ///
    /// Overall `success` is true as soon as one recipient got through.
    pub async fn send_bulk(&self, request: &BulkSendRequest) -> BulkSendResult {
        let total = request.recipients.len();
        if total == 0 {
            return BulkSendResult {
                success: false,
                total_sent: 0,
                total_failed: 0,
                failures: None,
                message: "no recipients".to_string(),
            };
        }

        let batch_size = self.batch_size(request.batch_size);
        let delay = request
            .delay_between_batches
            .map(Duration::from_millis)
            .unwrap_or(self.defaults.delay);
        let batch_count = total.div_ceil(batch_size);

        tracing::info!(
            recipients = total,
            batch_size,
            batches = batch_count,
            "Starting bulk send"
        );

        let mut total_sent = 0;
        let mut failures = Vec::new();

        for (index, batch) in request.recipients.chunks(batch_size).enumerate() {
            let results = join_all(batch.iter().map(|r| self.send_one(request, r))).await;

            for result in results {
                if result.success {
                    total_sent += 1;
                } else {
                    failures.push(RecipientFailure {
                        recipient: result.recipient,
                        error: result.error.unwrap_or_default(),
                    });
                }
            }

            tracing::debug!(
                batch = index + 1,
                of = batch_count,
                sent = total_sent,
                failed = failures.len(),
                "Batch complete"
            );

            if index + 1 < batch_count {
                self.limiter.pause(delay).await;
            }
        }

        let total_failed = failures.len();
        let message = if total_failed == 0 {
            format!("Sent {} of {} emails", total_sent, total)
        } else {
            format!(
                "Sent {} of {} emails, {} failed",
                total_sent, total, total_failed
            )
        };

        tracing::info!(sent = total_sent, failed = total_failed, "Bulk send finished");
        self.events.emit(MailEvent::BulkCompleted {
            total_sent,
            total_failed,
            at: Utc::now(),
        });

        BulkSendResult {
            success: total_sent > 0,
            total_sent,
            total_failed,
            failures: (!failures.is_empty()).then_some(failures),
            message,
        }
    }

    async fn send_one(&self, request: &BulkSendRequest, recipient: &Recipient) -> RecipientResult {
        self.limiter.acquire().await;
        let result = self.service.send(&request.request_for(recipient)).await;

        RecipientResult {
            recipient: recipient.address.clone(),
            success: result.success,
            error: (!result.success).then_some(result.message),
        }
    }
}
