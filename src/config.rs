use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `HARVEST__MAX_PAGES=20` or
/// `HARVEST__DELAY__MAX_MS=0`.
pub const ENV_PREFIX: &str = "HARVEST";

/// The `HarvestConfig` struct holds the settings for one harvester instance.
///
/// It is built once and passed into [`crate::Harvester::new`]; nothing in the
/// crate mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Base URL of the search endpoint; query parameters are appended to it.
    pub search_endpoint: String,
    /// The user agent string to be used in HTTP requests.
    pub user_agent: String,
    /// Market used when the request and the market table provide none.
    pub default_market: String,
    /// Language code results are normalized into.
    pub target_language: String,
    /// Hard cap on SERP pages fetched per harvest.
    pub max_pages: usize,
    /// Wall-clock budget for one harvest, in seconds.
    pub max_duration_secs: u64,
    /// Timeout for a SERP page fetch, in seconds.
    pub page_timeout_secs: u64,
    /// Timeout for the publication date fallback fetch, in seconds.
    pub recovery_timeout_secs: u64,
    /// Results per SERP page, used to compute the `first=` offset.
    pub results_per_page: usize,
    /// Randomized pause between consecutive pages.
    pub delay: DelayRange,
    /// How many phrases may be harvested at the same time.
    pub concurrent_phrases: usize,
    /// Whether to fetch result pages to recover a missing publication date.
    pub recover_dates_from_pages: bool,
    /// Optional translation service settings.
    pub translator: TranslatorConfig,
}

/// The `DelayRange` struct bounds the pause between pages, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

/// The `TranslatorConfig` struct points at a LibreTranslate-compatible service.
/// Without an endpoint, results pass through untranslated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 800,
            max_ms: 1800,
        }
    }
}

impl DelayRange {
    /// A zero delay, handy for tests and local replay.
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }
}

impl Default for HarvestConfig {
    /// Provides default values for the `HarvestConfig` struct.
    ///
    /// # Returns
    ///
    /// A `HarvestConfig` instance targeting Bing with the standard budgets.
    fn default() -> Self {
        Self {
            search_endpoint: String::from("https://www.bing.com/search"),
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            ),
            default_market: crate::DEFAULT_MARKET.to_string(),
            target_language: crate::DEFAULT_TARGET_LANGUAGE.to_string(),
            max_pages: crate::DEFAULT_MAX_PAGES,
            max_duration_secs: crate::DEFAULT_MAX_DURATION.as_secs(),
            page_timeout_secs: crate::DEFAULT_PAGE_TIMEOUT.as_secs(),
            recovery_timeout_secs: crate::DEFAULT_RECOVERY_TIMEOUT.as_secs(),
            results_per_page: crate::DEFAULT_RESULTS_PER_PAGE,
            delay: DelayRange::default(),
            concurrent_phrases: crate::DEFAULT_CONCURRENT_PHRASES,
            recover_dates_from_pages: true,
            translator: TranslatorConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Loads configuration from defaults, an optional file, then the environment.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to a TOML, YAML or JSON file. A missing file is an error
    ///   only when a path was given explicitly.
    ///
    /// # Returns
    ///
    /// A `Result` containing the merged configuration.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parses configuration from an in-memory TOML document, without the
    /// environment layer.
    pub fn from_toml_str(toml: &str) -> crate::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}
