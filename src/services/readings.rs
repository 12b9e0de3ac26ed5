// src/services/readings.rs

//! Readings orchestration: Day Cache first, then the Source Client and the
//! Section Extractor.
//!
//! Lookup order for a section on a day:
//! 1. cached artifact (`"<prefix> <day>"`)
//! 2. cached raw record (`"response <day>"`), then extract
//! 3. fetch, cache the raw record, then extract
//!
//! The four sections of a day therefore share one network call.

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Artifact, Config, DailyReadings, RawRecord, SectionCatalog, SectionKind};
use crate::services::extractor::SectionExtractor;
use crate::services::source::ContentSource;
use crate::storage::DayCache;
use crate::utils::format_day;

/// Resolves sections for a day through the cache.
pub struct ReadingsService<S> {
    source: S,
    extractor: SectionExtractor,
    catalog: SectionCatalog,
    cache: DayCache,
}

impl<S: ContentSource> ReadingsService<S> {
    pub fn new(
        source: S,
        extractor: SectionExtractor,
        catalog: SectionCatalog,
        cache: DayCache,
    ) -> Self {
        Self {
            source,
            extractor,
            catalog,
            cache,
        }
    }

    /// Build extractor, catalog and cache from configuration.
    pub fn from_config(source: S, config: &Config) -> Result<Self> {
        Ok(Self::new(
            source,
            SectionExtractor::new(&config.extraction)?,
            SectionCatalog::from_config(&config.extraction)?,
            DayCache::new(config.cache.ttl()),
        ))
    }

    pub fn cache(&self) -> &DayCache {
        &self.cache
    }

    /// Resolve one section for `day`.
    pub async fn section(
        &self,
        kind: SectionKind,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Artifact> {
        let day_key = format_day(day);
        let descriptor = self.catalog.get(kind);

        if let Some(artifact) = self
            .cache
            .lookup_artifact(&descriptor.cache_key_prefix, &day_key)
            .await
        {
            log::debug!("Cache hit for {} on {}", kind, day_key);
            return Ok(artifact);
        }

        let raw = self.raw_record(day, &day_key, cancel).await?;
        let artifact = self.extractor.extract(&raw, descriptor)?;
        log::info!(
            "Extracted {} for {}: '{}' ({} chars)",
            kind,
            day_key,
            artifact.title,
            artifact.content.chars().count()
        );

        self.cache
            .store_artifact(&descriptor.cache_key_prefix, &day_key, artifact.clone())
            .await;
        Ok(artifact)
    }

    async fn raw_record(
        &self,
        day: NaiveDate,
        day_key: &str,
        cancel: &CancellationToken,
    ) -> Result<RawRecord> {
        if let Some(raw) = self.cache.lookup_raw(day_key).await {
            log::debug!("Raw record for {} served from cache", day_key);
            return Ok(raw);
        }

        let raw = self.source.fetch(day, cancel).await?;
        self.cache.store_raw(day_key, raw.clone()).await;
        Ok(raw)
    }

    pub async fn gospel(&self, day: NaiveDate, cancel: &CancellationToken) -> Result<Artifact> {
        self.section(SectionKind::Gospel, day, cancel).await
    }

    pub async fn first_lecture(
        &self,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Artifact> {
        self.section(SectionKind::FirstLecture, day, cancel).await
    }

    pub async fn second_lecture(
        &self,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Artifact> {
        self.section(SectionKind::SecondLecture, day, cancel).await
    }

    pub async fn psalm(&self, day: NaiveDate, cancel: &CancellationToken) -> Result<Artifact> {
        self.section(SectionKind::Psalm, day, cancel).await
    }

    /// Resolve every section of `day`.
    ///
    /// Sections are resolved in turn so that the first one fills the raw
    /// record cache for the others.
    pub async fn readings(
        &self,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<DailyReadings> {
        let first_lecture = self.first_lecture(day, cancel).await?;
        let psalm = self.psalm(day, cancel).await?;
        let second_lecture = self.second_lecture(day, cancel).await?;
        let gospel = self.gospel(day, cancel).await?;

        Ok(DailyReadings::assemble(
            first_lecture,
            psalm,
            second_lecture,
            gospel,
        ))
    }
}
