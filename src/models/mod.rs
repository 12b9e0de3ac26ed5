// src/models/mod.rs

//! Domain models for the readings service.

mod config;
mod readings;
mod section;

// Re-export all public types
pub use config::{
    CacheConfig, Config, DeliveryConfig, DeliveryMode, ExtractionConfig, LoggingConfig,
    ProviderConfig, QueueConfig, SectionPattern, SubscribersConfig, TelegramConfig,
};
pub use readings::{Artifact, DailyReadings, RawRecord};
pub use section::{SectionCatalog, SectionDescriptor, SectionKind};
