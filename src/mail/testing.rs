//! Test doubles for the send path: a scripted transport and a ready-wired
//! service over the in-memory store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::mail::bulk::{BulkDefaults, BulkSender};
use crate::mail::events::{EventSink, MailEvent};
use crate::mail::sender::MailService;
use crate::mail::throttle::{Clock, ManualClock, RateLimiter};
use crate::mail::transport::{
    Delivery, OutboundMessage, Transport, TransportFactory, TransportResolver,
};
use crate::models::{
    CreateTransportConfigRequest, EmailLogEntry, StoredTransportConfig, TransportConfig,
};
use crate::store::{ConfigStore, EmailLog, MemoryStore};

#[derive(Default)]
struct ScriptState {
    message_id: String,
    failing: HashSet<String>,
    clock: Mutex<Option<Arc<dyn Clock>>>,
    attempts: Mutex<Vec<(Duration, OutboundMessage)>>,
    sent: Mutex<Vec<OutboundMessage>>,
    configs_used: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Transport factory whose transports succeed or fail by recipient
#[derive(Clone)]
pub struct ScriptedFactory {
    state: Arc<ScriptState>,
}

impl ScriptedFactory {
    /// Every delivery succeeds with the given message id
    pub fn succeeding(message_id: &str) -> Self {
        Self {
            state: Arc::new(ScriptState {
                message_id: message_id.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Deliveries addressed to any of `addresses` are rejected
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            state: Arc::new(ScriptState {
                message_id: "MID".to_string(),
                failing: addresses.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            }),
        }
    }

    /// Stamp each delivery attempt with this clock's time
    pub fn attach_clock(&self, clock: Arc<dyn Clock>) {
        if let Ok(mut slot) = self.state.clock.lock() {
            *slot = Some(clock);
        }
    }

    /// Every delivery attempt, successful or not
    pub fn attempts(&self) -> Vec<OutboundMessage> {
        self.stamped_attempts().into_iter().map(|(_, m)| m).collect()
    }

    /// Delivery attempts with the clock time they were issued at
    pub fn stamped_attempts(&self) -> Vec<(Duration, OutboundMessage)> {
        self.state
            .attempts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    /// Messages that were accepted
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.state.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Ids of the configs transports were built from
    pub fn configs_used(&self) -> Vec<String> {
        self.state
            .configs_used
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Highest number of deliveries in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TransportFactory for ScriptedFactory {
    fn create(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        if let Ok(mut used) = self.state.configs_used.lock() {
            used.push(config.id.clone());
        }
        Ok(Arc::new(ScriptedTransport {
            state: self.state.clone(),
        }))
    }
}

struct ScriptedTransport {
    state: Arc<ScriptState>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<Delivery> {
        let now = self
            .state
            .clock
            .lock()
            .ok()
            .and_then(|c| c.as_ref().map(|clock| clock.now()))
            .unwrap_or_default();
        if let Ok(mut attempts) = self.state.attempts.lock() {
            attempts.push((now, message.clone()));
        }

        let current = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let rejected = message
            .to
            .iter()
            .find(|to| self.state.failing.contains(bare_address(to)));
        if let Some(to) = rejected {
            return Err(AppError::Transport(format!(
                "recipient {} rejected",
                bare_address(to)
            )));
        }

        if let Ok(mut sent) = self.state.sent.lock() {
            sent.push(message.clone());
        }
        Ok(Delivery {
            message_id: self.state.message_id.clone(),
        })
    }
}

fn bare_address(formatted: &str) -> &str {
    match (formatted.rfind('<'), formatted.rfind('>')) {
        (Some(start), Some(end)) if start < end => &formatted[start + 1..end],
        _ => formatted,
    }
}

/// Email log that rejects every write
pub struct FailingLog;

#[async_trait]
impl EmailLog for FailingLog {
    async fn append(&self, _entry: &EmailLogEntry) -> Result<()> {
        Err(AppError::RedisError("log unavailable".to_string()))
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<EmailLogEntry>> {
        Err(AppError::RedisError("log unavailable".to_string()))
    }
}

/// Mail service, bulk sender and their collaborators, wired for tests
pub struct TestRig {
    pub store: Arc<MemoryStore>,
    pub factory: ScriptedFactory,
    pub clock: Arc<ManualClock>,
    pub service: MailService,
    pub bulk: BulkSender,
    pub events: mpsc::Receiver<MailEvent>,
    pub default_config: Option<StoredTransportConfig>,
}

impl TestRig {
    /// Store seeded with one default transport config
    pub async fn with_default_config(factory: ScriptedFactory) -> Self {
        let store = Arc::new(MemoryStore::default());
        Self::build(store.clone(), store, factory, true).await
    }

    /// Store with no configs at all
    pub async fn empty(factory: ScriptedFactory) -> Self {
        let store = Arc::new(MemoryStore::default());
        Self::build(store.clone(), store, factory, false).await
    }

    /// Default config present, but every log write fails
    pub async fn with_failing_log(factory: ScriptedFactory) -> Self {
        let store = Arc::new(MemoryStore::default());
        Self::build(store, Arc::new(FailingLog), factory, true).await
    }

    async fn build(
        store: Arc<MemoryStore>,
        log: Arc<dyn EmailLog>,
        factory: ScriptedFactory,
        seed_default: bool,
    ) -> Self {
        let default_config = if seed_default {
            let config = StoredTransportConfig::new(CreateTransportConfigRequest {
                name: "Default".to_string(),
                host: "smtp.example.com".to_string(),
                port: 587,
                secure: false,
                user: "default@example.com".to_string(),
                pass: "secret".to_string(),
                is_default: true,
            });
            // memory store writes cannot fail
            let _ = store.save_config(&config).await;
            Some(config)
        } else {
            None
        };

        let clock = Arc::new(ManualClock::new());
        factory.attach_clock(clock.clone());

        let (tx, events) = mpsc::channel(1024);
        let sink = EventSink::new(tx);

        let resolver = TransportResolver::new(store.clone(), Arc::new(factory.clone()));
        let service = MailService::new(resolver, store.clone(), log, sink.clone());
        let limiter = Arc::new(RateLimiter::unlimited(clock.clone()));
        let bulk = BulkSender::new(service.clone(), limiter, sink, BulkDefaults::default());

        Self {
            store,
            factory,
            clock,
            service,
            bulk,
            events,
            default_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_address() {
        assert_eq!(bare_address("\"Ann\" <a@x.com>"), "a@x.com");
        assert_eq!(bare_address("a@x.com"), "a@x.com");
    }
}
