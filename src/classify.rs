use crate::dates::{parse_date_text, recover_date_from_page};
use crate::shape::{CardOutcome, RawCard, SerpShape, SkipReason};
use crate::translate::primary_language;
use crate::{Fetcher, HarvestConfig, ResultKind, SearchResult, Translator};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One SERP split into its two result categories.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedPage {
    /// Results with a title, a link and a publication date, in page order.
    pub dated: Vec<SearchResult>,
    /// Results with a title or a link but no recoverable date, in page order.
    pub undated: Vec<SearchResult>,
    /// Cards that could not be turned into results.
    pub skipped: Vec<SkipReason>,
}

impl ClassifiedPage {
    /// `true` when the page produced no results of either kind.
    pub fn is_empty(&self) -> bool {
        self.dated.is_empty() && self.undated.is_empty()
    }
}

/// The `Classifier` struct turns SERP HTML into dated and undated results.
///
/// Markup knowledge lives in the [`SerpShape`]; the classifier owns the date
/// cascade and language normalization.
pub struct Classifier {
    shape: Box<dyn SerpShape>,
    translator: Arc<dyn Translator>,
    fetcher: Arc<dyn Fetcher>,
    target_language: String,
    recovery_timeout: Duration,
    recover_from_pages: bool,
}

impl Classifier {
    pub fn new(
        shape: Box<dyn SerpShape>,
        translator: Arc<dyn Translator>,
        fetcher: Arc<dyn Fetcher>,
        config: &HarvestConfig,
    ) -> Self {
        Self {
            shape,
            translator,
            fetcher,
            target_language: primary_language(&config.target_language),
            recovery_timeout: config.recovery_timeout(),
            recover_from_pages: config.recover_dates_from_pages,
        }
    }

    /// Classifies every card on one SERP.
    ///
    /// # Arguments
    ///
    /// * `html` - The raw SERP document.
    /// * `kind` - Which card shapes to scan.
    ///
    /// # Returns
    ///
    /// The dated and undated results in page order, plus the reasons for any
    /// skipped cards. Per-card problems never abort the page.
    #[instrument(skip(self, html), fields(html_length = html.len(), shape = self.shape.name()))]
    pub async fn classify(&self, html: &str, kind: ResultKind) -> ClassifiedPage {
        let outcomes = self.shape.extract_cards(html, kind);
        let mut page = ClassifiedPage::default();

        for outcome in outcomes {
            let card = match outcome {
                CardOutcome::Card(card) => card,
                CardOutcome::Skip(reason) => {
                    debug!(%reason, "Skipping card");
                    page.skipped.push(reason);
                    continue;
                }
            };

            let result = self.resolve_card(card).await;
            let has_identity = !result.title.is_empty() && !result.url.is_empty();
            if has_identity && result.is_dated() {
                page.dated.push(result);
            } else {
                debug!(title = %result.title, url = %result.url, "Result without date");
                page.undated.push(SearchResult {
                    published_date: None,
                    ..result
                });
            }
        }

        if page.is_empty() && !html.trim().is_empty() {
            warn!(
                %kind,
                skipped = page.skipped.len(),
                "No results parsed from page; card selectors might be outdated"
            );
        }
        page
    }

    async fn resolve_card(&self, card: RawCard) -> SearchResult {
        let published_date = self.resolve_date(&card).await;
        let title = card.title.unwrap_or_default();
        let url = card.url.unwrap_or_default();

        let mut result = SearchResult {
            title,
            url,
            snippet: card.snippet,
            published_date,
            original_title: None,
            original_snippet: None,
            source_language: None,
        };
        self.normalize_language(&mut result).await;
        result
    }

    /// Raw date hints, then the snippet, then the result page itself.
    async fn resolve_date(&self, card: &RawCard) -> Option<NaiveDate> {
        if let Some(date) = card
            .date_hints
            .iter()
            .find_map(|hint| parse_date_text(hint))
        {
            return Some(date);
        }
        if let Some(date) = parse_date_text(&card.snippet) {
            return Some(date);
        }

        // Without both a title and a link the card cannot be dated anyway.
        if !self.recover_from_pages || card.title.is_none() {
            return None;
        }
        let url = card.url.as_deref()?;
        recover_date_from_page(url, self.fetcher.as_ref(), self.recovery_timeout).await
    }

    async fn normalize_language(&self, result: &mut SearchResult) {
        if result.title.trim().is_empty() {
            return;
        }

        let translation = self.translator.translate(&result.title, &result.snippet).await;
        let Some(language) = translation.language else {
            return;
        };
        let language = primary_language(&language);
        if language.is_empty() || language == self.target_language {
            return;
        }

        result.original_title = Some(std::mem::replace(
            &mut result.title,
            format!("({}) {}", language, translation.title),
        ));
        result.original_snippet = Some(std::mem::replace(&mut result.snippet, translation.snippet));
        result.source_language = Some(language);
    }
}
