//! Common types and utilities shared across gist crates.
//!
//! This crate defines the data model that flows through the scrape-and-summarize
//! pipeline, the user-facing summary options, observability helpers, and the
//! shared error type. It is intentionally lightweight so that every crate in
//! the workspace can depend on it.
//!
//! # Overview
//!
//! - [`GistError`] and [`Result`]: tagged errors carrying an explicit `retryable` flag
//! - [`PageRecord`] / [`PageMetadata`]: the product of one successful extraction
//! - [`BatchOutcome`] / [`BatchReport`]: per-URL results handed to report assembly
//! - [`SummaryOptions`]: length/format/retry knobs supplied by the CLI
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use gist_common::{SummaryFormat, SummaryLength, SummaryOptions};
//!
//! let opts = SummaryOptions::default();
//! assert_eq!(opts.length, SummaryLength::Medium);
//! assert_eq!(opts.format, SummaryFormat::Paragraphs);
//! assert_eq!(opts.max_retries, 3);
//! assert!(opts.validate().is_ok());
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod error;
pub mod observability;

pub use error::{ErrorKind, GistError, Result};

/// Metadata captured alongside the extracted text of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub url: String,
    /// Extraction instant, serialized as RFC 3339 / ISO-8601.
    pub timestamp: DateTime<Utc>,
}

impl PageMetadata {
    /// Metadata for a URL that never produced a page (failed outcomes).
    pub fn bare(url: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            url: url.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The product of a single successful extraction.
///
/// Fields are private; a record is built once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    text: String,
    metadata: PageMetadata,
    links: Vec<String>,
}

impl PageRecord {
    pub fn new(text: String, metadata: PageMetadata, links: Vec<String>) -> Self {
        Self {
            text,
            metadata,
            links,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &PageMetadata {
        &self.metadata
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Split the record into its owned parts.
    pub fn into_parts(self) -> (String, PageMetadata, Vec<String>) {
        (self.text, self.metadata, self.links)
    }
}

/// Result of processing one URL at the orchestrator level.
///
/// Exactly one of `summary` (non-empty) or `error` is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub url: String,
    pub summary: String,
    pub metadata: PageMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl BatchOutcome {
    pub fn success(summary: String, metadata: PageMetadata, retries: u32) -> Self {
        Self {
            url: metadata.url.clone(),
            summary,
            metadata,
            error: None,
            retry_count: (retries > 0).then_some(retries),
        }
    }

    pub fn failure(url: &str, error: &GistError, retries: u32) -> Self {
        Self {
            url: url.to_string(),
            summary: String::new(),
            metadata: PageMetadata::bare(url),
            error: Some(error.to_string()),
            retry_count: (retries > 0).then_some(retries),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a pipeline run hands to report assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparative_error: Option<String>,
}

impl BatchReport {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }
}

/// Target summary length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    /// Instruction fragment used when building prompts.
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Short => "in 2-3 sentences",
            Self::Medium => "in 1-2 paragraphs",
            Self::Long => "in 3-5 detailed paragraphs",
        }
    }

    /// Upper bound on generated tokens for this length.
    pub fn max_tokens(self) -> u32 {
        match self {
            Self::Short => 200,
            Self::Medium => 500,
            Self::Long => 1200,
        }
    }
}

/// Target summary layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    #[default]
    Paragraphs,
    Bullets,
    Json,
}

impl SummaryFormat {
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Paragraphs => "Write the summary as flowing prose paragraphs.",
            Self::Bullets => "Write the summary as a bulleted list using '-' prefixes.",
            Self::Json => {
                "Respond with a single JSON object with keys \"title\", \"summary\" and \"key_points\" (array of strings). Do not wrap it in code fences."
            }
        }
    }
}

macro_rules! impl_option_enum_text {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text)),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = GistError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(GistError::invalid_input(format!(
                        "unrecognized {}: {other}",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

impl_option_enum_text!(SummaryLength { Short => "short", Medium => "medium", Long => "long" });
impl_option_enum_text!(SummaryFormat { Paragraphs => "paragraphs", Bullets => "bullets", Json => "json" });

/// Accepted range for [`SummaryOptions::follow_links`].
pub const FOLLOW_LINKS_RANGE: std::ops::RangeInclusive<u8> = 1..=20;
/// Accepted range for [`SummaryOptions::max_retries`].
pub const MAX_RETRIES_RANGE: std::ops::RangeInclusive<u32> = 0..=10;
/// Accepted range for [`SummaryOptions::retry_delay_ms`].
pub const RETRY_DELAY_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=30_000;

/// Per-run options supplied by the CLI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOptions {
    pub length: SummaryLength,
    pub format: SummaryFormat,
    pub include_metadata: bool,
    pub save_to_file: Option<PathBuf>,
    pub comparative: bool,
    pub follow_links: Option<u8>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            length: SummaryLength::default(),
            format: SummaryFormat::default(),
            include_metadata: false,
            save_to_file: None,
            comparative: false,
            follow_links: None,
            max_retries: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl SummaryOptions {
    /// Reject out-of-range numeric options.
    ///
    /// ```
    /// use gist_common::{ErrorKind, SummaryOptions};
    ///
    /// let opts = SummaryOptions { max_retries: 11, ..Default::default() };
    /// let err = opts.validate().unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::InvalidInput);
    /// assert!(!err.is_retryable());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.follow_links {
            if !FOLLOW_LINKS_RANGE.contains(&n) {
                return Err(GistError::invalid_input(format!(
                    "follow_links must be between 1 and 20, got {n}"
                )));
            }
        }
        if !MAX_RETRIES_RANGE.contains(&self.max_retries) {
            return Err(GistError::invalid_input(format!(
                "max_retries must be between 0 and 10, got {}",
                self.max_retries
            )));
        }
        if !RETRY_DELAY_RANGE_MS.contains(&self.retry_delay_ms) {
            return Err(GistError::invalid_input(format!(
                "retry_delay must be between 100 and 30000 ms, got {}",
                self.retry_delay_ms
            )));
        }
        Ok(())
    }
}
