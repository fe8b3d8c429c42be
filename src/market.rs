//! Search URL construction and market (locale) resolution.

use crate::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Language and region names mapped to Bing market codes.
const BUILTIN_MARKETS: &[(&str, &str)] = &[
    ("en", "en-US"),
    ("english", "en-US"),
    ("us", "en-US"),
    ("uk", "en-GB"),
    ("gb", "en-GB"),
    ("australia", "en-AU"),
    ("canada", "en-CA"),
    ("india", "en-IN"),
    ("de", "de-DE"),
    ("german", "de-DE"),
    ("germany", "de-DE"),
    ("austria", "de-AT"),
    ("fr", "fr-FR"),
    ("french", "fr-FR"),
    ("france", "fr-FR"),
    ("es", "es-ES"),
    ("spanish", "es-ES"),
    ("spain", "es-ES"),
    ("mexico", "es-MX"),
    ("it", "it-IT"),
    ("italian", "it-IT"),
    ("italy", "it-IT"),
    ("pt", "pt-PT"),
    ("portuguese", "pt-PT"),
    ("portugal", "pt-PT"),
    ("brazil", "pt-BR"),
    ("nl", "nl-NL"),
    ("dutch", "nl-NL"),
    ("pl", "pl-PL"),
    ("polish", "pl-PL"),
    ("ro", "ro-RO"),
    ("romanian", "ro-RO"),
    ("romania", "ro-RO"),
    ("ru", "ru-RU"),
    ("russian", "ru-RU"),
    ("uk-ua", "uk-UA"),
    ("ukrainian", "uk-UA"),
    ("tr", "tr-TR"),
    ("turkish", "tr-TR"),
    ("sv", "sv-SE"),
    ("swedish", "sv-SE"),
    ("da", "da-DK"),
    ("danish", "da-DK"),
    ("fi", "fi-FI"),
    ("finnish", "fi-FI"),
    ("no", "nb-NO"),
    ("norwegian", "nb-NO"),
    ("ja", "ja-JP"),
    ("japanese", "ja-JP"),
    ("japan", "ja-JP"),
    ("ko", "ko-KR"),
    ("korean", "ko-KR"),
    ("zh", "zh-CN"),
    ("chinese", "zh-CN"),
    ("china", "zh-CN"),
    ("ar", "ar-SA"),
    ("arabic", "ar-SA"),
];

/// Builds the SERP URL for one page.
///
/// # Arguments
///
/// * `endpoint` - The search endpoint, e.g. `https://www.bing.com/search`.
/// * `query` - The raw query; it is percent-encoded here.
/// * `offset` - 1-based index of the first result on the page.
/// * `market` - Optional market code appended as `mkt=`.
pub fn build_url(endpoint: &str, query: &str, offset: usize, market: Option<&str>) -> String {
    let mut url = format!(
        "{}?q={}&first={}",
        endpoint,
        urlencoding::encode(query),
        offset
    );
    if let Some(market) = market.filter(|m| !m.is_empty()) {
        url.push_str("&mkt=");
        url.push_str(&urlencoding::encode(market));
    }
    url
}

/// Case-insensitive table from language or region names to market codes.
#[derive(Debug, Clone, Default)]
pub struct MarketTable {
    entries: HashMap<String, String>,
}

impl MarketTable {
    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_MARKETS.iter().copied())
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
            .collect();
        Self { entries }
    }

    /// Loads a `{ "name": "market-code" }` JSON map from disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let map: HashMap<String, String> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), markets = map.len(), "Loaded market table");
        Ok(Self::from_pairs(map))
    }

    /// Adds every entry of `other`, overriding duplicates.
    pub fn merged_with(mut self, other: MarketTable) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a name to a market code.
    ///
    /// A miss returns the input unchanged, on the assumption that it already
    /// is a market code. `None` stays `None`.
    pub fn resolve(&self, code: Option<&str>) -> Option<String> {
        let code = code.map(str::trim).filter(|c| !c.is_empty())?;
        match self.entries.get(&code.to_lowercase()) {
            Some(market) => Some(market.clone()),
            None => {
                debug!(%code, "No market table entry; using input as market code");
                Some(code.to_string())
            }
        }
    }

    /// Resolves the user's explicit choice first, then a detected language.
    pub fn resolve_preferred(&self, user: Option<&str>, detected: Option<&str>) -> Option<String> {
        self.resolve(user).or_else(|| self.resolve(detected))
    }
}
