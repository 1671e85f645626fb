pub mod email;
pub mod template;
pub mod transport;

// -----------------------------
// Send path
// -----------------------------
pub use email::{
    BulkSendRequest,
    BulkSendResult,
    EmailLogEntry,
    OneOrMany,
    Recipient,
    RecipientFailure,
    RecipientResult,
    SendRequest,
    SendResult,
    TemplateData,
};

// -----------------------------
// Stored configuration records
// -----------------------------
pub use template::{
    CreateTemplateRequest,
    RenderTemplateRequest,
    RenderedTemplate,
    TemplateDefinition,
    UpdateTemplateRequest,
};

pub use transport::{
    CreateTransportConfigRequest,
    InlineTransportConfig,
    SmtpAuth,
    StoredTransportConfig,
    TransportConfig,
    TransportConfigView,
    UpdateTransportConfigRequest,
    INLINE_CONFIG_ID,
};
