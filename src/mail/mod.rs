pub mod bulk;
pub mod events;
pub mod recipient;
pub mod sender;
pub mod template;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod throttle;
pub mod transport;

pub use bulk::{BulkDefaults, BulkSender};
pub use events::{EventSink, MailEvent, WebhookDispatcher};
pub use sender::MailService;
pub use throttle::{Clock, ManualClock, RateLimiter, SystemClock};
pub use transport::{
    Delivery, OutboundMessage, SmtpTransportFactory, Transport, TransportFactory,
    TransportResolver,
};
