use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which SERP vertical a harvest targets.
///
/// `News` scans both news cards and generic result blocks; `Web` scans only
/// the generic blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    #[default]
    News,
    Web,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::News => f.write_str("news"),
            ResultKind::Web => f.write_str("web"),
        }
    }
}

/// One extracted search result.
///
/// A result always has a non-empty `title` or a non-empty `url`; the missing
/// one (if any) is stored as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(rename = "date", skip_serializing_if = "Option::is_none", default)]
    pub published_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_language: Option<String>,
}

impl SearchResult {
    /// The key used for cross-page deduplication: the URL, or the title when
    /// the card carried no link.
    pub fn dedup_key(&self) -> &str {
        if self.url.is_empty() {
            &self.title
        } else {
            &self.url
        }
    }

    pub fn is_dated(&self) -> bool {
        self.published_date.is_some()
    }
}

/// Input to a single harvest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub query: String,
    pub dated_target: usize,
    pub undated_target: usize,
    #[serde(default)]
    pub kind: ResultKind,
    #[serde(default)]
    pub market: Option<String>,
    /// Language the query is written in, as reported by the caller's
    /// language detection. Picks the market when `market` is absent.
    #[serde(default)]
    pub language: Option<String>,
}

impl HarvestRequest {
    pub fn new(query: impl Into<String>, dated_target: usize, undated_target: usize) -> Self {
        Self {
            query: query.into(),
            dated_target,
            undated_target,
            kind: ResultKind::News,
            market: None,
            language: None,
        }
    }

    pub fn with_kind(mut self, kind: ResultKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Same targets, kind, market and language, different query.
    pub fn for_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..self.clone()
        }
    }
}

/// Why a harvest loop stopped. Every variant is a normal return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "status")]
pub enum StopReason {
    QuotasMet,
    EmptyPage,
    PageLimit,
    TimeLimit,
    Interrupted,
    FetchFailed,
    HttpStatus(u16),
}

/// The bounded output of one harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestOutcome {
    pub dated: Vec<SearchResult>,
    pub undated: Vec<SearchResult>,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
}

/// Harvest output tagged with the phrase that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseHarvest {
    pub phrase: String,
    #[serde(flatten)]
    pub outcome: HarvestOutcome,
}

/// What a fetch collaborator hands back: the status code and the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, url: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: String::new(),
            published_date: None,
            original_title: None,
            original_snippet: None,
            source_language: None,
        }
    }

    #[test]
    fn test_dedup_key_prefers_url() {
        assert_eq!(result("Title", "https://a.example").dedup_key(), "https://a.example");
        assert_eq!(result("Title only", "").dedup_key(), "Title only");
    }

    #[test]
    fn test_request_for_query_keeps_settings() {
        let base = HarvestRequest::new("first", 5, 3)
            .with_kind(ResultKind::Web)
            .with_market("de-DE")
            .with_language("de");
        let next = base.for_query("second");

        assert_eq!(next.query, "second");
        assert_eq!(next.dated_target, 5);
        assert_eq!(next.undated_target, 3);
        assert_eq!(next.kind, ResultKind::Web);
        assert_eq!(next.market.as_deref(), Some("de-DE"));
        assert_eq!(next.language.as_deref(), Some("de"));
    }

    #[test]
    fn test_fetch_response_success_range() {
        assert!(FetchResponse::new(200, "").is_success());
        assert!(FetchResponse::new(204, "").is_success());
        assert!(!FetchResponse::new(302, "").is_success());
        assert!(!FetchResponse::new(429, "").is_success());
    }

    #[test]
    fn test_search_result_serializes_date_as_iso() {
        let mut r = result("T", "https://a.example");
        r.published_date = NaiveDate::from_ymd_opt(2024, 9, 8);
        let json = serde_json::to_value(&r).unwrap();

        assert_eq!(json["date"], "2024-09-08");
        assert!(json.get("source_language").is_none());
    }
}
