// src/services/mod.rs

//! Service layer: retrieval, extraction and delivery.

pub mod compose;
pub mod dispatcher;
pub mod extractor;
#[cfg(feature = "sqs")]
pub mod queue;
pub mod readings;
pub mod source;
pub mod telegram;

pub use dispatcher::{
    CHAT_ID_ATTRIBUTE, Delivered, DeliveryOutcome, DeliveryTarget, DispatchReport, DispatchStatus,
    Dispatcher, MessageSink, OutboundMessage,
};
pub use extractor::SectionExtractor;
#[cfg(feature = "sqs")]
pub use queue::QueueSink;
pub use readings::ReadingsService;
pub use source::{ContentSource, ProviderClient};
pub use telegram::TelegramSink;
