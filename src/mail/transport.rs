//! Transport selection and SMTP delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::{InlineTransportConfig, OneOrMany, TransportConfig};
use crate::store::ConfigStore;

/// Fully addressed message handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: OneOrMany<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// What the transport reports back for an accepted message
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: String,
}

/// Send-capable handle bound to one mail server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a message; every provider failure maps to `AppError::Transport`
    async fn deliver(&self, message: &OutboundMessage) -> Result<Delivery>;
}

/// Builds transports from configs
pub trait TransportFactory: Send + Sync {
    fn create(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>>;
}

/// A transport together with the config it was built from
#[derive(Clone)]
pub struct ResolvedTransport {
    pub config: TransportConfig,
    pub transport: Arc<dyn Transport>,
}

/// Picks the transport for a send: inline config, then config id, then the
/// store's default.
#[derive(Clone)]
pub struct TransportResolver {
    configs: Arc<dyn ConfigStore>,
    factory: Arc<dyn TransportFactory>,
}

impl TransportResolver {
    pub fn new(configs: Arc<dyn ConfigStore>, factory: Arc<dyn TransportFactory>) -> Self {
        Self { configs, factory }
    }

    /// Select the config without building a transport
    pub async fn select(
        &self,
        inline: Option<&InlineTransportConfig>,
        config_id: Option<&str>,
    ) -> Result<TransportConfig> {
        if let Some(inline) = inline {
            return Ok(inline.clone().into());
        }

        if let Some(id) = config_id {
            return self
                .configs
                .get_config(id)
                .await?
                .map(Into::into)
                .ok_or_else(|| AppError::ConfigNotFound(id.to_string()));
        }

        self.configs
            .get_default_config()
            .await?
            .map(Into::into)
            .ok_or(AppError::NoDefaultConfig)
    }

    pub async fn resolve(
        &self,
        inline: Option<&InlineTransportConfig>,
        config_id: Option<&str>,
    ) -> Result<ResolvedTransport> {
        let config = self.select(inline, config_id).await?;
        let transport = self.factory.create(&config)?;

        tracing::debug!(config_id = %config.id, host = %config.host, "Transport resolved");

        Ok(ResolvedTransport { config, transport })
    }
}

// ==================== SMTP ====================

/// Builds lettre SMTP transports
#[derive(Debug, Clone)]
pub struct SmtpTransportFactory {
    timeout: Duration,
}

impl SmtpTransportFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportFactory for SmtpTransportFactory {
    fn create(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        // secure = implicit TLS (465); otherwise upgrade with STARTTLS when offered
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            let tls = TlsParameters::new(config.host.clone())?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .tls(Tls::Opportunistic(tls))
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(self.timeout));

        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        Ok(Arc::new(SmtpTransport {
            transport: builder.build(),
            hostname: config.host.clone(),
        }))
    }
}

struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    hostname: String,
}

impl SmtpTransport {
    fn build_message(&self, message: &OutboundMessage, message_id: &str) -> Result<Message> {
        let mut builder = Message::builder()
            .message_id(Some(message_id.to_string()))
            .from(parse_mailbox(&message.from)?)
            .subject(&message.subject);

        for to in message.to.iter() {
            builder = builder.to(parse_mailbox(to)?);
        }

        for cc in &message.cc {
            builder = builder.cc(parse_mailbox(cc)?);
        }

        for bcc in &message.bcc {
            builder = builder.bcc(parse_mailbox(bcc)?);
        }

        let part = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone());

        Ok(builder.singlepart(part)?)
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<Delivery> {
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.hostname);
        let email = self.build_message(message, &message_id)?;

        self.transport.send(email).await?;

        Ok(Delivery { message_id })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| AppError::Transport(format!("Invalid address '{}': {}", address, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateTransportConfigRequest, StoredTransportConfig};
    use crate::store::MemoryStore;

    struct NullFactory;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn deliver(&self, _message: &OutboundMessage) -> Result<Delivery> {
            Ok(Delivery {
                message_id: "null".to_string(),
            })
        }
    }

    impl TransportFactory for NullFactory {
        fn create(&self, _config: &TransportConfig) -> Result<Arc<dyn Transport>> {
            Ok(Arc::new(NullTransport))
        }
    }

    fn stored(name: &str, is_default: bool) -> StoredTransportConfig {
        StoredTransportConfig::new(CreateTransportConfigRequest {
            name: name.to_string(),
            host: format!("{}.example.com", name),
            port: 587,
            secure: false,
            user: format!("{}@example.com", name),
            pass: "secret".to_string(),
            is_default,
        })
    }

    fn inline() -> InlineTransportConfig {
        InlineTransportConfig {
            host: "inline.example.com".to_string(),
            port: 2525,
            secure: false,
            user: "inline@example.com".to_string(),
            pass: "secret".to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn test_resolution_precedence() {
        let store = Arc::new(MemoryStore::default());
        let by_id = stored("by-id", false);
        let default = stored("default", true);
        store.save_config(&by_id).await.unwrap();
        store.save_config(&default).await.unwrap();

        let resolver = TransportResolver::new(store.clone(), Arc::new(NullFactory));
        let inline = inline();

        // all three available: inline wins
        let picked = resolver
            .select(Some(&inline), Some(&by_id.id))
            .await
            .unwrap();
        assert!(picked.is_inline());
        assert_eq!(picked.host, "inline.example.com");

        // no inline: id wins over default
        let picked = resolver.select(None, Some(&by_id.id)).await.unwrap();
        assert_eq!(picked.id, by_id.id);

        // neither: default
        let picked = resolver.select(None, None).await.unwrap();
        assert_eq!(picked.id, default.id);

        // nothing at all
        store.delete_config(&default.id).await.unwrap();
        let err = resolver.select(None, None).await.unwrap_err();
        assert!(matches!(err, AppError::NoDefaultConfig));
    }

    #[tokio::test]
    async fn test_unknown_config_id() {
        let store = Arc::new(MemoryStore::default());
        store.save_config(&stored("default", true)).await.unwrap();
        let resolver = TransportResolver::new(store, Arc::new(NullFactory));

        let err = resolver.select(None, Some("missing")).await.unwrap_err();
        assert!(matches!(err, AppError::ConfigNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_resolve_builds_transport_for_selected_config() {
        let store = Arc::new(MemoryStore::default());
        let resolver = TransportResolver::new(store, Arc::new(NullFactory));
        let inline = inline();

        let resolved = resolver.resolve(Some(&inline), None).await.unwrap();
        assert_eq!(resolved.config.port, 2525);

        let message = OutboundMessage {
            from: "inline@example.com".to_string(),
            to: OneOrMany::One("a@x.com".to_string()),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: "S".to_string(),
            html: "B".to_string(),
        };
        let delivery = resolved.transport.deliver(&message).await.unwrap();
        assert_eq!(delivery.message_id, "null");
    }

    #[tokio::test]
    async fn test_smtp_factory_builds_message_with_display_names() {
        let factory = SmtpTransportFactory::new(Duration::from_secs(5));
        let config: TransportConfig = inline().into();
        assert!(factory.create(&config).is_ok());

        let transport = SmtpTransport {
            transport: AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost")
                .build(),
            hostname: "localhost".to_string(),
        };
        let message = OutboundMessage {
            from: "\"Relay\" <relay@example.com>".to_string(),
            to: OneOrMany::Many(vec![
                "\"Ann\" <a@x.com>".to_string(),
                "b@x.com".to_string(),
            ]),
            cc: vec!["c@x.com".to_string()],
            bcc: Vec::new(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
        };

        let built = transport.build_message(&message, "<id@localhost>").unwrap();
        let raw = String::from_utf8(built.formatted()).unwrap();
        assert!(raw.contains("Message-ID: <id@localhost>"));
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("a@x.com"));
        assert!(raw.contains("b@x.com"));
    }

    #[test]
    fn test_invalid_address_is_transport_error() {
        let err = parse_mailbox("not an address").unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }
}
