use std::time::Duration;
use thiserror::Error;

pub mod classify;
pub mod config;
pub mod dates;
pub mod fetch;
pub mod harvest;
pub mod market;
pub mod oldest;
pub mod shape;
pub mod translate;
pub mod types;

// Re-export commonly used types
pub use classify::{ClassifiedPage, Classifier};
pub use config::HarvestConfig;
pub use fetch::{Fetcher, HttpFetcher};
pub use harvest::{CancelFlag, Harvester};
pub use market::MarketTable;
pub use oldest::oldest;
pub use translate::{LibreTranslator, PassthroughTranslator, Translation, Translator};
pub use types::{
    FetchResponse, HarvestOutcome, HarvestRequest, PhraseHarvest, ResultKind, SearchResult,
    StopReason,
};

/// The `HarvestError` enum represents the errors that can escape the harvester.
///
/// Transport failures during a harvest are not errors: they end the loop with
/// a [`StopReason`]. These variants cover construction and collaborator calls.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Represents an error that occurs during an HTTP request.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// A response arrived but carried a non-success status.
    #[error("HTTP status {0}")]
    Http(u16),
    /// Represents an error while loading or merging configuration sources.
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    /// Represents a JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Represents a filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A CSS selector in a page-shape adapter failed to compile.
    #[error("Invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

/// A type alias for `Result` with the `HarvestError` error type.
pub type Result<T> = std::result::Result<T, HarvestError>;

// Constants

/// The default timeout for fetching one SERP page.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(15);
/// The default timeout for the page-level publication date fallback.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(10);
/// The default cap on SERP pages fetched per harvest.
pub const DEFAULT_MAX_PAGES: usize = 100;
/// The default wall-clock budget for a single harvest.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(90);
/// Results the engine returns per page; drives the `first=` offset.
pub const DEFAULT_RESULTS_PER_PAGE: usize = 10;
/// Market used when neither the caller nor language detection supplies one.
pub const DEFAULT_MARKET: &str = "en-US";
/// Language results are normalized into.
pub const DEFAULT_TARGET_LANGUAGE: &str = "en";
/// The default number of phrases harvested concurrently.
pub const DEFAULT_CONCURRENT_PHRASES: usize = 4;
