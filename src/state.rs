use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::mail::{
    BulkDefaults, BulkSender, Clock, EventSink, MailService, RateLimiter, TransportFactory,
    TransportResolver,
};
use crate::store::{ConfigStore, EmailLog, TemplateStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub configs: Arc<dyn ConfigStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub email_log: Arc<dyn EmailLog>,
    pub mailer: Arc<MailService>,
    pub bulk: Arc<BulkSender>,
}

impl AppState {
    pub fn new(
        config: Config,
        configs: Arc<dyn ConfigStore>,
        templates: Arc<dyn TemplateStore>,
        email_log: Arc<dyn EmailLog>,
        factory: Arc<dyn TransportFactory>,
        clock: Arc<dyn Clock>,
        events: EventSink,
    ) -> Self {
        let resolver = TransportResolver::new(configs.clone(), factory);
        let mailer = MailService::new(resolver, templates.clone(), email_log.clone(), events.clone());

        let limiter = Arc::new(RateLimiter::new(clock, config.rate_limit_per_minute));
        let defaults = BulkDefaults {
            batch_size: config.default_batch_size,
            delay: Duration::from_millis(config.default_batch_delay_ms),
            max_batch_size: config.max_batch_size,
        };
        let bulk = BulkSender::new(mailer.clone(), limiter, events, defaults);

        Self {
            config: Arc::new(config),
            configs,
            templates,
            email_log,
            mailer: Arc::new(mailer),
            bulk: Arc::new(bulk),
        }
    }
}
