// src/services/extractor.rs

//! Section Extractor.
//!
//! Isolates one section of the provider's HTML body with the section's
//! boundary pattern, then reads title, reference and paragraphs from the
//! resulting fragment.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Artifact, ExtractionConfig, RawRecord, SectionDescriptor};

/// Extracts artifacts from raw records.
#[derive(Debug, Clone)]
pub struct SectionExtractor {
    title: Selector,
    reference: Selector,
    paragraph: Selector,
}

impl SectionExtractor {
    /// Create an extractor with the configured selectors.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            title: parse_selector(&config.title_selector)?,
            reference: parse_selector(&config.reference_selector)?,
            paragraph: parse_selector(&config.paragraph_selector)?,
        })
    }

    /// Extract the section described by `descriptor`.
    ///
    /// A pattern that matches nothing yields an artifact with only `day` set.
    /// Fails only if the pattern matches but has no marker capture group.
    pub fn extract(&self, raw: &RawRecord, descriptor: &SectionDescriptor) -> Result<Artifact> {
        let text = raw.html_body.replace(['\n', '\t'], "");

        let Some(captures) = descriptor.boundary.captures(&text) else {
            log::debug!("No {} section in '{}'", descriptor.kind, raw.title);
            return Ok(Artifact::day_only(&raw.title));
        };
        let span = captures.get(0).map_or("", |m| m.as_str());
        if span.is_empty() {
            return Ok(Artifact::day_only(&raw.title));
        }

        let marker = captures.get(1).ok_or_else(|| {
            AppError::extraction(
                descriptor.kind.as_str(),
                "boundary pattern has no marker capture group",
            )
        })?;
        let fragment = span.replace(marker.as_str(), "");

        let document = Html::parse_document(&fragment);
        let paragraphs: Vec<String> = document
            .select(&self.paragraph)
            .map(|p| element_text(&p))
            .collect();

        Ok(Artifact {
            day: raw.title.clone(),
            title: first_text(&document, &self.title),
            reference: first_text(&document, &self.reference),
            content: join_paragraphs(&paragraphs, descriptor.psalm_join),
        })
    }
}

/// Join non-empty paragraphs with newlines.
///
/// Without `psalm_join` the final paragraph is set apart by a blank line.
pub fn join_paragraphs(paragraphs: &[String], psalm_join: bool) -> String {
    let last = paragraphs.len().saturating_sub(1);
    let mut content = String::new();

    for (i, paragraph) in paragraphs.iter().enumerate() {
        if paragraph.is_empty() {
            continue;
        }
        if !content.is_empty() {
            content.push_str(if !psalm_join && i == last { "\n\n" } else { "\n" });
        }
        content.push_str(paragraph);
    }

    content
}

fn first_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
