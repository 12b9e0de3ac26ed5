// src/models/section.rs

//! Section kinds and the extraction policy attached to each of them.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::config::{ExtractionConfig, SectionPattern};

/// One of the four liturgical units published per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    FirstLecture,
    Psalm,
    SecondLecture,
    Gospel,
}

impl SectionKind {
    /// All sections in reading order.
    pub const ALL: [SectionKind; 4] = [
        SectionKind::FirstLecture,
        SectionKind::Psalm,
        SectionKind::SecondLecture,
        SectionKind::Gospel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::FirstLecture => "first_lecture",
            SectionKind::Psalm => "psalm",
            SectionKind::SecondLecture => "second_lecture",
            SectionKind::Gospel => "gospel",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first_lecture" | "first" => Ok(SectionKind::FirstLecture),
            "psalm" => Ok(SectionKind::Psalm),
            "second_lecture" | "second" => Ok(SectionKind::SecondLecture),
            "gospel" => Ok(SectionKind::Gospel),
            other => Err(AppError::validation(format!("unknown section '{other}'"))),
        }
    }
}

/// Extraction policy for one section: where it starts and ends, how its
/// artifacts are keyed in the cache, and how its paragraphs are joined.
#[derive(Debug, Clone)]
pub struct SectionDescriptor {
    pub kind: SectionKind,
    pub boundary: Regex,
    pub cache_key_prefix: String,
    pub psalm_join: bool,
}

impl SectionDescriptor {
    /// Compile a descriptor. Fails if the boundary pattern is not a valid regex.
    pub fn new(
        kind: SectionKind,
        pattern: &str,
        cache_key_prefix: impl Into<String>,
        psalm_join: bool,
    ) -> Result<Self> {
        let boundary = Regex::new(pattern)
            .map_err(|e| AppError::config(format!("invalid {kind} boundary pattern: {e}")))?;
        Ok(Self {
            kind,
            boundary,
            cache_key_prefix: cache_key_prefix.into(),
            psalm_join,
        })
    }

    fn from_pattern(kind: SectionKind, pattern: &SectionPattern) -> Result<Self> {
        Self::new(
            kind,
            &pattern.pattern,
            pattern.cache_prefix.clone(),
            pattern.psalm_join,
        )
    }
}

/// The four compiled descriptors, built once at startup.
#[derive(Debug, Clone)]
pub struct SectionCatalog {
    first_lecture: SectionDescriptor,
    psalm: SectionDescriptor,
    second_lecture: SectionDescriptor,
    gospel: SectionDescriptor,
}

impl SectionCatalog {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let catalog = Self {
            first_lecture: SectionDescriptor::from_pattern(
                SectionKind::FirstLecture,
                &config.first_lecture,
            )?,
            psalm: SectionDescriptor::from_pattern(SectionKind::Psalm, &config.psalm)?,
            second_lecture: SectionDescriptor::from_pattern(
                SectionKind::SecondLecture,
                &config.second_lecture,
            )?,
            gospel: SectionDescriptor::from_pattern(SectionKind::Gospel, &config.gospel)?,
        };

        let mut prefixes: Vec<&str> = SectionKind::ALL
            .iter()
            .map(|kind| catalog.get(*kind).cache_key_prefix.as_str())
            .collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        if prefixes.len() != SectionKind::ALL.len() {
            return Err(AppError::config("section cache prefixes must be distinct"));
        }

        Ok(catalog)
    }

    pub fn get(&self, kind: SectionKind) -> &SectionDescriptor {
        match kind {
            SectionKind::FirstLecture => &self.first_lecture,
            SectionKind::Psalm => &self.psalm,
            SectionKind::SecondLecture => &self.second_lecture,
            SectionKind::Gospel => &self.gospel,
        }
    }
}
