// src/models/config.rs

//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::section::SectionCatalog;

/// Longest accepted cache TTL (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Readings provider endpoint and HTTP behavior
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Day cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Section boundaries and HTML selectors
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Fan-out settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Queue hop between producer and consumer
    #[serde(default)]
    pub queue: QueueConfig,

    /// Where recipients come from
    #[serde(default)]
    pub subscribers: SubscribersConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Defaults overridden by `LECTIO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup, e.g. the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LECTIO_PROVIDER_URL") {
            self.provider.url = url;
        }
        if let Some(secs) = lookup("LECTIO_DEADLINE_SECS") {
            self.provider.deadline_secs = parse_number("LECTIO_DEADLINE_SECS", &secs)?;
        }
        if let Some(secs) = lookup("LECTIO_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_number("LECTIO_CACHE_TTL_SECS", &secs)?;
        }
        if let Some(mode) = lookup("LECTIO_DELIVERY_MODE") {
            self.delivery.mode = mode.parse()?;
        }
        if let Some(n) = lookup("LECTIO_MAX_CONCURRENT") {
            self.delivery.max_concurrent = parse_number("LECTIO_MAX_CONCURRENT", &n)?;
        }
        if let Some(token) = lookup("LECTIO_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(name) = lookup("LECTIO_QUEUE_NAME") {
            self.queue.queue_name = name;
        }
        if let Some(region) = lookup("LECTIO_AWS_REGION") {
            self.queue.region = region;
        }
        if let Some(endpoint) = lookup("LECTIO_SQS_ENDPOINT") {
            self.queue.endpoint = Some(endpoint).filter(|e| !e.is_empty());
        }
        if let Some(ids) = lookup("LECTIO_CHAT_IDS") {
            self.subscribers.chat_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.provider.user_agent.trim().is_empty() {
            return Err(AppError::validation("provider.user_agent is empty"));
        }
        Url::parse(&self.provider.url)?;
        if self.provider.timeout_secs == 0 {
            return Err(AppError::validation("provider.timeout_secs must be > 0"));
        }
        if self.provider.deadline_secs == 0 {
            return Err(AppError::validation("provider.deadline_secs must be > 0"));
        }
        if self.cache.ttl_secs == 0 || self.cache.ttl_secs > MAX_TTL_SECS {
            return Err(AppError::validation(format!(
                "cache.ttl_secs must be between 1 and {MAX_TTL_SECS}"
            )));
        }
        if self.delivery.max_concurrent == 0 {
            return Err(AppError::validation("delivery.max_concurrent must be > 0"));
        }
        Url::parse(&self.telegram.api_url)?;
        if self.queue.queue_name.trim().is_empty() {
            return Err(AppError::validation("queue.queue_name is empty"));
        }
        SectionCatalog::from_config(&self.extraction)?;
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::config(format!("{key} must be a number, got '{value}'")))
}

/// Readings provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint receiving the `dia=YYYY-MM-DD` form
    #[serde(default = "defaults::provider_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Per-invocation deadline propagated to every fetch
    #[serde(default = "defaults::deadline")]
    pub deadline_secs: u64,
}

impl ProviderConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: defaults::provider_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            deadline_secs: defaults::deadline(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Validity window of cached records and artifacts
    #[serde(default = "defaults::ttl")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::ttl(),
        }
    }
}

/// Boundary pattern and join policy for one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPattern {
    /// Regex whose first capture group is the marker stripped from the span
    pub pattern: String,

    /// Cache key prefix for this section's artifacts
    pub cache_prefix: String,

    /// Join every paragraph with a single newline
    #[serde(default)]
    pub psalm_join: bool,
}

/// Where sections start and end and which nodes hold their fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    #[serde(default = "defaults::reference_selector")]
    pub reference_selector: String,

    #[serde(default = "defaults::paragraph_selector")]
    pub paragraph_selector: String,

    #[serde(default = "defaults::first_lecture")]
    pub first_lecture: SectionPattern,

    #[serde(default = "defaults::psalm")]
    pub psalm: SectionPattern,

    #[serde(default = "defaults::second_lecture")]
    pub second_lecture: SectionPattern,

    #[serde(default = "defaults::gospel")]
    pub gospel: SectionPattern,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            title_selector: defaults::title_selector(),
            reference_selector: defaults::reference_selector(),
            paragraph_selector: defaults::paragraph_selector(),
            first_lecture: defaults::first_lecture(),
            psalm: defaults::psalm(),
            second_lecture: defaults::second_lecture(),
            gospel: defaults::gospel(),
        }
    }
}

/// How the scheduled job hands readings to recipients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Send the composed messages straight to each chat
    #[default]
    Telegram,
    /// Enqueue one bundle per chat for a downstream consumer
    Queue,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Telegram => f.write_str("telegram"),
            DeliveryMode::Queue => f.write_str("queue"),
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(DeliveryMode::Telegram),
            "queue" | "sqs" => Ok(DeliveryMode::Queue),
            other => Err(AppError::config(format!("unknown delivery mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,

    /// Maximum sends in flight at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "defaults::telegram_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub bot_token: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::telegram_api_url(),
            bot_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "defaults::queue_name")]
    pub queue_name: String,

    #[serde(default = "defaults::region")]
    pub region: String,

    /// Custom endpoint, e.g. a local SQS emulator
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_name: defaults::queue_name(),
            region: defaults::region(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribersConfig {
    /// JSON file backing the local subscriber store
    #[serde(default = "defaults::subscribers_path")]
    pub path: PathBuf,

    /// Fixed recipients, used when no store is available
    #[serde(default)]
    pub chat_ids: Vec<String>,
}

impl Default for SubscribersConfig {
    fn default() -> Self {
        Self {
            path: defaults::subscribers_path(),
            chat_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::SectionPattern;

    // Provider defaults
    pub fn provider_url() -> String {
        "https://www.archimadrid.org/index.php/oracion-y-liturgia/index.php?option=com_archimadrid&format=ajax&task=leer_lecturas".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; lectio/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn deadline() -> u64 {
        10
    }

    pub fn ttl() -> u64 {
        24 * 60 * 60
    }

    // Extraction defaults
    pub fn title_selector() -> String {
        ".Tit_Lectura".into()
    }
    pub fn reference_selector() -> String {
        ".Tit_Negro_Normal".into()
    }
    pub fn paragraph_selector() -> String {
        "p".into()
    }
    pub fn first_lecture() -> SectionPattern {
        SectionPattern {
            pattern: r"(PRIMERA\sLECTURA).*?Palabra de Dios\.".into(),
            cache_prefix: "first lecture".into(),
            psalm_join: false,
        }
    }
    pub fn psalm() -> SectionPattern {
        SectionPattern {
            pattern: r"(Palabra\sde\sDios\..*<p>)<span.*?\sR.\s".into(),
            cache_prefix: "psalm".into(),
            psalm_join: true,
        }
    }
    pub fn second_lecture() -> SectionPattern {
        SectionPattern {
            pattern: r"(SEGUNDA\sLECTURA).*?Palabra de Dios\.".into(),
            cache_prefix: "second lecture".into(),
            psalm_join: false,
        }
    }
    pub fn gospel() -> SectionPattern {
        SectionPattern {
            pattern: r"(EVANGELIO).*".into(),
            cache_prefix: "gospel".into(),
            psalm_join: false,
        }
    }

    pub fn max_concurrent() -> usize {
        16
    }

    pub fn telegram_api_url() -> String {
        "https://api.telegram.org".into()
    }

    pub fn queue_name() -> String {
        "lectio".into()
    }
    pub fn region() -> String {
        "eu-west-3".into()
    }

    pub fn subscribers_path() -> PathBuf {
        PathBuf::from("storage/subscribers.json")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.provider.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.delivery.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bounds_cache_ttl() {
        let mut config = Config::default();
        config.cache.ttl_secs = MAX_TTL_SECS;
        assert!(config.validate().is_ok());

        config.cache.ttl_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_rejects_bad_provider_url() {
        let mut config = Config::default();
        config.provider.url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [delivery]
            mode = "queue"

            [extraction.gospel]
            pattern = "(EVANGELIO).*"
            cache_prefix = "gospel"
            psalm_join = true
            "#,
        )
        .unwrap();

        assert_eq!(config.delivery.mode, DeliveryMode::Queue);
        assert_eq!(config.delivery.max_concurrent, 16);
        assert!(config.extraction.gospel.psalm_join);
        assert!(config.extraction.psalm.psalm_join);
        assert_eq!(config.cache.ttl(), Duration::from_secs(86_400));
        assert_eq!(config.provider.deadline(), Duration::from_secs(10));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/data/config.toml")).unwrap();
        let defaults = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.provider.url, defaults.provider.url);
        assert_eq!(config.extraction.psalm.pattern, defaults.extraction.psalm.pattern);
        assert_eq!(config.extraction.gospel.pattern, defaults.extraction.gospel.pattern);
        assert!(!config.extraction.first_lecture.psalm_join);
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LECTIO_DELIVERY_MODE", "queue"),
            ("LECTIO_MAX_CONCURRENT", "4"),
            ("LECTIO_CHAT_IDS", "10, 20,,30"),
            ("LECTIO_SQS_ENDPOINT", ""),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.delivery.mode, DeliveryMode::Queue);
        assert_eq!(config.delivery.max_concurrent, 4);
        assert_eq!(config.subscribers.chat_ids, vec!["10", "20", "30"]);
        assert!(config.queue.endpoint.is_none());
    }

    #[test]
    fn overrides_reject_non_numeric_values() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "LECTIO_CACHE_TTL_SECS").then(|| "a day".to_string())
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
