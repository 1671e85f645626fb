//! Single-send operation: resolve transport, render, deliver, log.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::mail::events::{EventSink, MailEvent};
use crate::mail::recipient::{format, format_many};
use crate::mail::template::render_template;
use crate::mail::transport::{Delivery, OutboundMessage, TransportResolver};
use crate::models::{EmailLogEntry, RenderedTemplate, SendRequest, SendResult};
use crate::store::{EmailLog, TemplateStore};

/// What is known about a send so far, kept for the log entries
#[derive(Debug, Default)]
struct Attempt {
    config_id: Option<String>,
    template_id: Option<String>,
    subject: Option<String>,
    template_fallback_used: bool,
}

/// Sends one request through one transport call
#[derive(Clone)]
pub struct MailService {
    resolver: TransportResolver,
    templates: Arc<dyn TemplateStore>,
    log: Arc<dyn EmailLog>,
    events: EventSink,
}

impl MailService {
    pub fn new(
        resolver: TransportResolver,
        templates: Arc<dyn TemplateStore>,
        log: Arc<dyn EmailLog>,
        events: EventSink,
    ) -> Self {
        Self {
            resolver,
            templates,
            log,
            events,
        }
    }

    /// Send a request. Never fails: every error ends up in the result and
    /// in one log entry per `to` recipient.
    pub async fn send(&self, request: &SendRequest) -> SendResult {
        let mut attempt = Attempt::default();
        let outcome = self.attempt(request, &mut attempt).await;

        let recipients: Vec<String> = request.to.iter().map(|r| r.address.clone()).collect();
        let subject = attempt
            .subject
            .clone()
            .unwrap_or_else(|| request.subject.clone());

        match outcome {
            Ok(delivery) => {
                let message = format!(
                    "Email sent successfully. Message ID: {}",
                    delivery.message_id
                );
                tracing::info!(
                    recipients = recipients.len(),
                    message_id = %delivery.message_id,
                    config_id = ?attempt.config_id,
                    "Email sent"
                );

                self.write_log(&recipients, &attempt, &subject, true, &message)
                    .await;
                self.events.emit(MailEvent::EmailSent {
                    recipients,
                    subject,
                    message_id: delivery.message_id.clone(),
                    config_id: attempt.config_id.clone().unwrap_or_default(),
                    at: Utc::now(),
                });

                SendResult {
                    success: true,
                    message,
                    message_id: Some(delivery.message_id),
                    template_fallback_used: attempt.template_fallback_used,
                }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    recipients = recipients.len(),
                    config_id = ?attempt.config_id,
                    error = %message,
                    "Email send failed"
                );

                self.write_log(&recipients, &attempt, &subject, false, &message)
                    .await;
                self.events.emit(MailEvent::EmailFailed {
                    recipients,
                    subject,
                    error: message.clone(),
                    at: Utc::now(),
                });

                SendResult {
                    success: false,
                    message,
                    message_id: None,
                    template_fallback_used: attempt.template_fallback_used,
                }
            }
        }
    }

    async fn attempt(&self, request: &SendRequest, attempt: &mut Attempt) -> Result<Delivery> {
        if request.to.is_empty() {
            return Err(AppError::BadRequest("no recipients".to_string()));
        }

        let resolved = self
            .resolver
            .resolve(request.transport.as_ref(), request.config_id.as_deref())
            .await?;
        attempt.config_id = Some(resolved.config.id.clone());

        let content = self.content(request, attempt).await?;
        attempt.subject = Some(content.subject.clone());

        let from = request
            .from
            .clone()
            .filter(|from| !from.trim().is_empty())
            .or_else(|| Some(resolved.config.user.clone()).filter(|user| !user.trim().is_empty()))
            .ok_or_else(|| {
                AppError::BadRequest(
                    "from is required when the transport has no user".to_string(),
                )
            })?;

        let message = OutboundMessage {
            from,
            to: format_many(&request.to),
            cc: request.cc.iter().map(format).collect(),
            bcc: request.bcc.iter().map(format).collect(),
            subject: content.subject,
            html: content.body,
        };

        resolved.transport.deliver(&message).await
    }

    /// Subject and body for the request, rendered from a template when one
    /// is referenced and found
    async fn content(
        &self,
        request: &SendRequest,
        attempt: &mut Attempt,
    ) -> Result<RenderedTemplate> {
        let literal = || RenderedTemplate {
            subject: request.subject.clone(),
            body: request.body.clone(),
        };

        let template = if let Some(id) = request.template_id.as_deref() {
            let found = self.templates.get_template(id).await?;
            if found.is_none() {
                tracing::warn!(
                    error = %AppError::TemplateNotFound(id.to_string()),
                    "Falling back to literal subject and body"
                );
            }
            found
        } else if request.use_default_template {
            let found = self.templates.get_default_template().await?;
            if found.is_none() {
                tracing::warn!("No default template, falling back to literal subject and body");
            }
            found
        } else {
            return Ok(literal());
        };

        match template {
            Some(template) => {
                attempt.template_id = Some(template.id.clone());
                Ok(render_template(&template, &request.template_data))
            }
            None => {
                attempt.template_fallback_used = true;
                Ok(literal())
            }
        }
    }

    async fn write_log(
        &self,
        recipients: &[String],
        attempt: &Attempt,
        subject: &str,
        success: bool,
        message: &str,
    ) {
        for recipient in recipients {
            let entry = EmailLogEntry::new(
                attempt.config_id.clone(),
                attempt.template_id.clone(),
                recipient.clone(),
                subject.to_string(),
                success,
                message.to_string(),
            );

            if let Err(e) = self.log.append(&entry).await {
                tracing::warn!(recipient = %recipient, error = %e, "Failed to write email log entry");
            }
        }
    }
}
