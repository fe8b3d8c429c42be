//! Page-shape adapters: everything that knows an engine's SERP markup.
//!
//! A markup change should only ever touch this module. The classifier works
//! on the engine-neutral [`RawCard`] values produced here.

use crate::{HarvestError, Result, ResultKind};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use url::Url;

/// Which card layout a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    News,
    Generic,
}

/// One SERP card as lifted from the markup, before any date resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCard {
    pub card_type: CardType,
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: String,
    /// Candidate date fragments, most specific first.
    pub date_hints: Vec<String>,
}

/// Why a card was not turned into a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither a title nor a link could be found.
    MissingIdentity(CardType),
    /// A container matched the selector but not any known card layout.
    UnknownContainer(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingIdentity(card) => write!(f, "{card:?} card has no title or link"),
            SkipReason::UnknownContainer(tag) => write!(f, "unrecognized container <{tag}>"),
        }
    }
}

/// Per-card extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardOutcome {
    Card(RawCard),
    Skip(SkipReason),
}

/// A narrow adapter over one engine's result markup.
pub trait SerpShape: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Extracts every result card of the requested kind, in document order.
    fn extract_cards(&self, html: &str, kind: ResultKind) -> Vec<CardOutcome>;
}

/// Path fragments that mark an engine-internal click-tracking redirect.
const REDIRECT_MARKERS: [&str; 2] = ["/ck/a?", "/aclick?"];
const BING_ORIGIN: &str = "https://www.bing.com/";

/// Selectors for Bing's news cards and generic `li.b_algo` results.
pub struct BingShape {
    news_containers: Selector,
    web_containers: Selector,
    news_title: Selector,
    news_snippet: Selector,
    news_date: Selector,
    algo_title: Selector,
    algo_snippet: Selector,
    any_paragraph: Selector,
    attribution: Selector,
    span: Selector,
    fact_fallbacks: Vec<Selector>,
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| HarvestError::Selector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

impl BingShape {
    /// Compiles the selector set.
    ///
    /// # Returns
    ///
    /// A `Result` containing the adapter, or a `Selector` error naming the bad selector.
    pub fn new() -> Result<Self> {
        Ok(Self {
            news_containers: compile(".news-card, li.b_algo")?,
            web_containers: compile("li.b_algo")?,
            news_title: compile("a.title")?,
            news_snippet: compile("div.snippet")?,
            news_date: compile("span.news_dt")?,
            algo_title: compile("h2 a")?,
            algo_snippet: compile(".b_caption p")?,
            any_paragraph: compile("p")?,
            attribution: compile(".b_attribution")?,
            span: compile("span")?,
            fact_fallbacks: vec![compile(".b_meta .b_fact")?, compile(".b_fact")?],
        })
    }

    fn news_card(&self, card: ElementRef<'_>) -> RawCard {
        let link = card.select(&self.news_title).next();
        let date_hints = first_text(card, &self.news_date).into_iter().collect();

        RawCard {
            card_type: CardType::News,
            title: link.map(element_text).filter(|t| !t.is_empty()),
            url: link.and_then(href),
            snippet: first_text(card, &self.news_snippet).unwrap_or_default(),
            date_hints,
        }
    }

    fn generic_card(&self, card: ElementRef<'_>) -> RawCard {
        let link = card.select(&self.algo_title).next();
        let snippet = first_text(card, &self.algo_snippet)
            .or_else(|| first_text(card, &self.any_paragraph))
            .unwrap_or_default();

        RawCard {
            card_type: CardType::Generic,
            title: link.map(element_text).filter(|t| !t.is_empty()),
            url: link.and_then(href).map(|h| unwrap_redirect(&h)),
            snippet,
            date_hints: self.generic_date_hints(card),
        }
    }

    /// Attribution text first (own text nodes, then nested spans), then the
    /// fact-row fallbacks. Only fragments containing a digit are kept.
    fn generic_date_hints(&self, card: ElementRef<'_>) -> Vec<String> {
        let mut hints = Vec::new();

        if let Some(attribution) = card.select(&self.attribution).next() {
            let own_text = attribution
                .children()
                .filter_map(|node| node.value().as_text())
                .map(|text| text.trim())
                .filter(|text| has_digit(text))
                .collect::<Vec<_>>()
                .join(" ");
            hints.push(own_text);

            let span_text = attribution
                .select(&self.span)
                .map(element_text)
                .filter(|text| has_digit(text))
                .collect::<Vec<_>>()
                .join(" ");
            hints.push(span_text);
        }

        for selector in &self.fact_fallbacks {
            if let Some(text) = first_text(card, selector) {
                hints.push(text);
            }
        }

        hints.retain(|hint| has_digit(hint));
        hints.dedup();
        hints
    }
}

impl SerpShape for BingShape {
    fn name(&self) -> &'static str {
        "bing"
    }

    fn extract_cards(&self, html: &str, kind: ResultKind) -> Vec<CardOutcome> {
        let document = Html::parse_document(html);
        let containers = match kind {
            ResultKind::News => &self.news_containers,
            ResultKind::Web => &self.web_containers,
        };

        document
            .select(containers)
            .map(|container| {
                let element = container.value();
                let card = if element.name() == "div" && element.classes().any(|c| c == "news-card")
                {
                    self.news_card(container)
                } else if element.name() == "li" && element.classes().any(|c| c == "b_algo") {
                    self.generic_card(container)
                } else {
                    return CardOutcome::Skip(SkipReason::UnknownContainer(
                        element.name().to_string(),
                    ));
                };

                if card.title.is_none() && card.url.is_none() {
                    CardOutcome::Skip(SkipReason::MissingIdentity(card.card_type))
                } else {
                    CardOutcome::Card(card)
                }
            })
            .collect()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn href(link: ElementRef<'_>) -> Option<String> {
    link.value()
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

/// Replaces an engine click-tracking link with its `u` target.
///
/// Links without a redirect marker, or without a usable `u` parameter, are
/// returned unchanged.
pub fn unwrap_redirect(href: &str) -> String {
    if !REDIRECT_MARKERS.iter().any(|marker| href.contains(marker)) {
        return href.to_string();
    }

    let parsed = Url::parse(href)
        .or_else(|_| Url::parse(BING_ORIGIN).and_then(|base| base.join(href)));
    let Ok(parsed) = parsed else {
        return href.to_string();
    };

    match parsed.query_pairs().find(|(key, _)| key == "u") {
        Some((_, target)) => decode_target(&target).unwrap_or_else(|| target.into_owned()),
        None => href.to_string(),
    }
}

/// Bing wraps targets as `a1` + unpadded URL-safe base64; plain URLs pass through.
fn decode_target(value: &str) -> Option<String> {
    if value.starts_with("http") {
        return Some(value.to_string());
    }
    let encoded = value.strip_prefix("a1")?.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    decoded.starts_with("http").then_some(decoded)
}
