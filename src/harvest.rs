use crate::classify::{ClassifiedPage, Classifier};
use crate::config::DelayRange;
use crate::market::{build_url, MarketTable};
use crate::shape::{BingShape, SerpShape};
use crate::{
    translate, Fetcher, HarvestConfig, HarvestOutcome, HarvestRequest, HttpFetcher,
    PhraseHarvest, Result, SearchResult, StopReason, Translator,
};
use futures::{stream, StreamExt};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Cooperative cancellation shared between a caller and running harvests.
///
/// Harvests check it once per page, before fetching; an in-flight fetch is
/// always allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable bookkeeping for a single harvest call. Never shared.
struct HarvestState {
    seen: HashSet<String>,
    dated: Vec<SearchResult>,
    undated: Vec<SearchResult>,
    page_index: usize,
    started: Instant,
}

impl HarvestState {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            dated: Vec::new(),
            undated: Vec::new(),
            page_index: 0,
            started: Instant::now(),
        }
    }

    fn quotas_met(&self, request: &HarvestRequest) -> bool {
        self.dated.len() >= request.dated_target && self.undated.len() >= request.undated_target
    }

    /// Appends unseen results while each list is under its target.
    /// Returns how many dated and undated results were added.
    fn merge(&mut self, page: ClassifiedPage, request: &HarvestRequest) -> (usize, usize) {
        let added_dated = Self::merge_into(
            &mut self.seen,
            &mut self.dated,
            page.dated,
            request.dated_target,
        );
        let added_undated = Self::merge_into(
            &mut self.seen,
            &mut self.undated,
            page.undated,
            request.undated_target,
        );
        (added_dated, added_undated)
    }

    fn merge_into(
        seen: &mut HashSet<String>,
        list: &mut Vec<SearchResult>,
        incoming: Vec<SearchResult>,
        target: usize,
    ) -> usize {
        let before = list.len();
        for result in incoming {
            if list.len() >= target {
                break;
            }
            if seen.insert(result.dedup_key().to_string()) {
                list.push(result);
            } else {
                debug!(key = %result.dedup_key(), "Duplicate result dropped");
            }
        }
        list.len() - before
    }

    fn finish(self, stop_reason: StopReason) -> HarvestOutcome {
        HarvestOutcome {
            dated: self.dated,
            undated: self.undated,
            pages_fetched: self.page_index,
            stop_reason,
        }
    }
}

/// The `Harvester` struct runs bounded fetch, classify and merge loops.
pub struct Harvester {
    config: HarvestConfig,
    fetcher: Arc<dyn Fetcher>,
    classifier: Classifier,
    markets: MarketTable,
}

impl Harvester {
    /// Creates a new `Harvester` using the Bing page shape.
    ///
    /// # Arguments
    ///
    /// * `config` - Budgets, endpoint and delays.
    /// * `fetcher` - Used for SERP pages and for the date fallback.
    /// * `translator` - Language normalization collaborator.
    /// * `markets` - Table used to resolve request markets.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Harvester`, or an error if the page shape fails to build.
    pub fn new(
        config: HarvestConfig,
        fetcher: Arc<dyn Fetcher>,
        translator: Arc<dyn Translator>,
        markets: MarketTable,
    ) -> Result<Self> {
        let shape = BingShape::new()?;
        Ok(Self::with_shape(
            config,
            fetcher,
            translator,
            markets,
            Box::new(shape),
        ))
    }

    /// Same as [`Harvester::new`] with an explicit page-shape adapter.
    pub fn with_shape(
        config: HarvestConfig,
        fetcher: Arc<dyn Fetcher>,
        translator: Arc<dyn Translator>,
        markets: MarketTable,
        shape: Box<dyn SerpShape>,
    ) -> Self {
        let classifier = Classifier::new(shape, translator, fetcher.clone(), &config);
        Self {
            config,
            fetcher,
            classifier,
            markets,
        }
    }

    /// Wires the HTTP fetcher and the configured translator.
    pub fn from_config(config: HarvestConfig, markets: MarketTable) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        let translator: Arc<dyn Translator> = Arc::from(translate::from_config(&config)?);
        Self::new(config, fetcher, translator, markets)
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Market code used for a request: the caller's market, else the market
    /// of the query language, else the configured default.
    pub fn market_for(&self, request: &HarvestRequest) -> String {
        self.markets
            .resolve_preferred(request.market.as_deref(), request.language.as_deref())
            .unwrap_or_else(|| self.config.default_market.clone())
    }

    /// Runs one harvest for a single query.
    ///
    /// Pages are fetched strictly in sequence. The loop stops when both quotas
    /// are met, a page classifies to nothing, a fetch fails or returns a
    /// non-2xx status, a budget runs out, or `cancel` is set. Every stop is a
    /// normal return carrying whatever was collected.
    ///
    /// Quotas are only compared after a page has been merged, so page 0 is
    /// fetched even when both targets are zero.
    #[instrument(skip(self, request, cancel), fields(query = %request.query, kind = %request.kind))]
    pub async fn harvest(&self, request: &HarvestRequest, cancel: &CancelFlag) -> HarvestOutcome {
        let market = self.market_for(request);
        let per_page = self.config.results_per_page.max(1);
        let mut state = HarvestState::new();

        let stop_reason = loop {
            if cancel.is_cancelled() {
                info!(pages = state.page_index, "Harvest interrupted");
                break StopReason::Interrupted;
            }
            if state.page_index >= self.config.max_pages {
                info!(pages = state.page_index, "Page budget exhausted");
                break StopReason::PageLimit;
            }
            if state.started.elapsed() >= self.config.max_duration() {
                info!(elapsed = ?state.started.elapsed(), "Time budget exhausted");
                break StopReason::TimeLimit;
            }

            let offset = state.page_index * per_page + 1;
            let url = build_url(
                &self.config.search_endpoint,
                &request.query,
                offset,
                Some(&market),
            );
            info!(page = state.page_index + 1, %url, "Fetching SERP page");

            let response = match self.fetcher.fetch(&url, self.config.page_timeout()).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Request failed");
                    break StopReason::FetchFailed;
                }
            };
            if !response.is_success() {
                warn!(status = response.status, "Non-success response");
                break StopReason::HttpStatus(response.status);
            }

            let page = self.classifier.classify(&response.body, request.kind).await;
            state.page_index += 1;

            if page.is_empty() {
                warn!(page = state.page_index, "No results found on this page. Stopping search.");
                break StopReason::EmptyPage;
            }

            let (page_dated, page_undated) = (page.dated.len(), page.undated.len());
            let (added_dated, added_undated) = state.merge(page, request);
            info!(
                page = state.page_index,
                page_dated,
                page_undated,
                added_dated,
                added_undated,
                dated = state.dated.len(),
                undated = state.undated.len(),
                "Merged page"
            );

            if state.quotas_met(request) {
                info!("Both dated and undated result targets met. Stopping search.");
                break StopReason::QuotasMet;
            }

            if state.page_index < self.config.max_pages {
                pause(self.config.delay).await;
            }
        };

        state.finish(stop_reason)
    }

    /// Harvests each phrase independently, a few at a time.
    ///
    /// # Arguments
    ///
    /// * `phrases` - Search phrases in the order they should be reported.
    /// * `template` - Targets, kind and market shared by every phrase.
    /// * `cancel` - Stops every running harvest at its next page boundary.
    ///
    /// # Returns
    ///
    /// One `PhraseHarvest` per phrase, in input order.
    pub async fn harvest_phrases(
        &self,
        phrases: &[String],
        template: &HarvestRequest,
        cancel: &CancelFlag,
    ) -> Vec<PhraseHarvest> {
        stream::iter(phrases)
            .map(|phrase| {
                let request = template.for_query(phrase.clone());
                async move {
                    let outcome = self.harvest(&request, cancel).await;
                    PhraseHarvest {
                        phrase: request.query,
                        outcome,
                    }
                }
            })
            .buffered(self.config.concurrent_phrases.max(1))
            .collect()
            .await
    }
}

/// Sleeps for a random duration inside the configured range.
async fn pause(delay: DelayRange) {
    let millis = if delay.max_ms > delay.min_ms {
        rand::rng().random_range(delay.min_ms..=delay.max_ms)
    } else {
        delay.min_ms
    };
    if millis > 0 {
        sleep(Duration::from_millis(millis)).await;
    }
}
