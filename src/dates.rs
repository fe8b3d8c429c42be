//! Publication date extraction.
//!
//! Two layers: [`parse_date_text`] turns a free-text fragment into a calendar
//! date, and [`recover_date_from_page`] fetches a result's own page and walks
//! a fixed cascade of metadata lookups when the SERP did not show a date.

use crate::fetch::Fetcher;
use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(minute|min|hour|hr|day|week|month|year)s?\s+ago")
        .expect("relative date pattern")
});

static COMPACT_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*(mo|m|h|d|w|y)\s*$").expect("compact relative pattern")
});

static TRAILING_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+-]\d{2}:\d{2}$").expect("offset pattern"));

/// How a matched fragment is turned into a date.
#[derive(Clone, Copy)]
enum Layout {
    /// A full date; parsed as-is.
    Date(&'static str),
    /// A date with time of day; the time is dropped.
    DateTime(&'static str),
    /// Month and year only; pinned to the first of the month.
    MonthYear(&'static str),
}

/// Absolute patterns, tried in order. The first one that both matches and
/// parses wins. Full dates come before month-only forms so that
/// "8 September 2024" is not read as September 1. Month names must be whole
/// words, so "Grammar 2024" is not March.
static ABSOLUTE: Lazy<Vec<(Regex, Layout)>> = Lazy::new(|| {
    [
        (r"\b([A-Za-z]{3,9}\s\d{1,2},\s\d{4})\b", Layout::Date("%B %d, %Y")),
        (r"\b([A-Za-z]{3}\s\d{1,2},\s\d{4})\b", Layout::Date("%b %d, %Y")),
        (
            r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})",
            Layout::DateTime("%Y-%m-%dT%H:%M:%S"),
        ),
        (r"(\d{4}-\d{2}-\d{2})", Layout::Date("%Y-%m-%d")),
        (r"\b(\d{1,2}\s[A-Za-z]{3,9}\s\d{4})\b", Layout::Date("%d %B %Y")),
        (r"\b([A-Za-z]{3,9}\s\d{4})\b", Layout::MonthYear("%B %Y")),
        (r"\b([A-Za-z]{3}\s\d{4})\b", Layout::MonthYear("%b %Y")),
    ]
    .into_iter()
    .map(|(pattern, layout)| (Regex::new(pattern).expect("absolute date pattern"), layout))
    .collect()
});

/// Metadata tags checked first on a fetched page, in priority order.
const META_SELECTORS: [&str; 8] = [
    r#"meta[property="article:published_time"]"#,
    r#"meta[name="publication-date"]"#,
    r#"meta[name="date"]"#,
    r#"meta[name="sailthru.date"]"#,
    r#"meta[property="rnews:datePublished"]"#,
    r#"meta[property="og:published_time"]"#,
    r#"meta[name="publish_date"]"#,
    r#"meta[itemprop="datePublished"]"#,
];

/// Structured-data keys that carry a publication date.
const JSON_LD_KEYS: [&str; 3] = ["datePublished", "dateCreated", "uploadDate"];

const HEURISTIC_SELECTOR: &str =
    r#"[class*="publi"], [class*="date"], [class*="timestamp"], [id*="date"]"#;

/// Parses a free-text date expression relative to the local clock.
///
/// See [`parse_date_text_at`] for the accepted shapes.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    parse_date_text_at(text, Local::now().naive_local())
}

/// Parses a free-text date expression against an explicit reference time.
///
/// Relative expressions ("3 days ago", "2h") are resolved against `reference`,
/// with a month counted as 30 days and a year as 365. Otherwise a trailing
/// UTC offset is stripped and the absolute patterns are tried in order.
pub fn parse_date_text_at(text: &str, reference: NaiveDateTime) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_relative(text, reference) {
        return Some(date);
    }

    let cleaned = TRAILING_OFFSET.replace(text, "");
    ABSOLUTE.iter().find_map(|(pattern, layout)| {
        pattern
            .captures_iter(&cleaned)
            .find_map(|caps| parse_layout(caps.get(1)?.as_str(), *layout))
    })
}

fn parse_relative(text: &str, reference: NaiveDateTime) -> Option<NaiveDate> {
    let (amount, unit) = if let Some(caps) = RELATIVE.captures(text) {
        (caps[1].parse::<i64>().ok()?, caps[2].to_ascii_lowercase())
    } else if let Some(caps) = COMPACT_RELATIVE.captures(text) {
        (caps[1].parse::<i64>().ok()?, caps[2].to_ascii_lowercase())
    } else {
        return None;
    };

    let offset = match unit.as_str() {
        "minute" | "min" | "m" => ChronoDuration::try_minutes(amount)?,
        "hour" | "hr" | "h" => ChronoDuration::try_hours(amount)?,
        "day" | "d" => ChronoDuration::try_days(amount)?,
        "week" | "w" => ChronoDuration::try_weeks(amount)?,
        "month" | "mo" => ChronoDuration::try_days(amount.checked_mul(30)?)?,
        "year" | "y" => ChronoDuration::try_days(amount.checked_mul(365)?)?,
        _ => return None,
    };

    reference.checked_sub_signed(offset).map(|dt| dt.date())
}

fn parse_layout(fragment: &str, layout: Layout) -> Option<NaiveDate> {
    match layout {
        Layout::Date(format) => NaiveDate::parse_from_str(fragment, format).ok(),
        Layout::DateTime(format) => NaiveDateTime::parse_from_str(fragment, format)
            .ok()
            .map(|dt| dt.date()),
        Layout::MonthYear(format) => {
            NaiveDate::parse_from_str(&format!("1 {fragment}"), &format!("%d {format}")).ok()
        }
    }
}

/// Fetches a result page and looks for its publication date.
///
/// # Arguments
///
/// * `url` - The result's target URL.
/// * `fetcher` - The fetch collaborator.
/// * `timeout` - Per-request timeout.
///
/// # Returns
///
/// The first date found by [`extract_published_date`], or `None` when the fetch
/// fails, the status is not 2xx, or the page carries no recognizable date.
#[instrument(skip(fetcher, timeout))]
pub async fn recover_date_from_page(
    url: &str,
    fetcher: &dyn Fetcher,
    timeout: Duration,
) -> Option<NaiveDate> {
    let response = match fetcher.fetch(url, timeout).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Date fallback fetch failed");
            return None;
        }
    };

    if !response.is_success() {
        warn!(status = response.status, "Date fallback fetch returned non-success status");
        return None;
    }
    if response.body.trim().is_empty() {
        return None;
    }

    let date = extract_published_date(&response.body);
    if date.is_none() {
        debug!("No publication date found on page");
    }
    date
}

/// Searches an HTML document for a publication date.
///
/// Priority: metadata tags, then `application/ld+json` blocks, then the first
/// `<time datetime>` element, then the first element whose class or id looks
/// date-related. Malformed markup or JSON just falls through to the next step.
pub fn extract_published_date(html: &str) -> Option<NaiveDate> {
    let document = Html::parse_document(html);

    from_meta(&document)
        .or_else(|| from_json_ld(&document))
        .or_else(|| from_time_element(&document))
        .or_else(|| from_heuristic(&document))
}

fn from_meta(document: &Html) -> Option<NaiveDate> {
    META_SELECTORS.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        let content = document.select(&selector).next()?.value().attr("content")?;
        parse_date_text(content)
    })
}

fn from_json_ld(document: &Html) -> Option<NaiveDate> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    document.select(&selector).find_map(|script| {
        let raw: String = script.text().collect();
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => date_from_ld_value(&value),
            Err(e) => {
                debug!(error = %e, "Skipping unparsable JSON-LD block");
                None
            }
        }
    })
}

fn date_from_ld_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Array(items) => items.iter().find_map(date_from_ld_value),
        Value::Object(map) => JSON_LD_KEYS
            .iter()
            .find_map(|key| map.get(*key)?.as_str().and_then(parse_date_text))
            .or_else(|| map.get("@graph").and_then(date_from_ld_value)),
        _ => None,
    }
}

fn from_time_element(document: &Html) -> Option<NaiveDate> {
    let selector = Selector::parse("time[datetime]").ok()?;
    let datetime = document.select(&selector).next()?.value().attr("datetime")?;
    parse_date_text(datetime)
}

fn from_heuristic(document: &Html) -> Option<NaiveDate> {
    let selector = Selector::parse(HEURISTIC_SELECTOR).ok()?;
    let element = document.select(&selector).next()?;
    let text = element_text(element);
    if text.is_empty() {
        return None;
    }
    parse_date_text(&text)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
    }

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_relative_days() {
        assert_eq!(parse_date_text_at("3 days ago", reference()), ymd(2024, 3, 12));
        assert_eq!(parse_date_text_at("1 day ago", reference()), ymd(2024, 3, 14));
    }

    #[test]
    fn test_relative_units() {
        assert_eq!(parse_date_text_at("13 hours ago", reference()), ymd(2024, 3, 14));
        assert_eq!(parse_date_text_at("2 weeks ago", reference()), ymd(2024, 3, 1));
        assert_eq!(parse_date_text_at("2 months ago", reference()), ymd(2024, 1, 15));
        assert_eq!(parse_date_text_at("1 year ago", reference()), ymd(2023, 3, 16));
        assert_eq!(parse_date_text_at("45 minutes ago", reference()), ymd(2024, 3, 15));
    }

    #[test]
    fn test_relative_inside_longer_text() {
        assert_eq!(
            parse_date_text_at("Reuters · 4 Days Ago · World", reference()),
            ymd(2024, 3, 11)
        );
    }

    #[test]
    fn test_compact_relative() {
        assert_eq!(parse_date_text_at("2d", reference()), ymd(2024, 3, 13));
        assert_eq!(parse_date_text_at("14h", reference()), ymd(2024, 3, 14));
        assert_eq!(parse_date_text_at("1mo", reference()), ymd(2024, 2, 14));
        // Only a whole-text match counts as compact.
        assert_eq!(parse_date_text_at("route 2d", reference()), None);
    }

    #[test]
    fn test_absolute_formats() {
        let r = reference();
        assert_eq!(parse_date_text_at("September 8, 2024", r), ymd(2024, 9, 8));
        assert_eq!(parse_date_text_at("Sep 8, 2024", r), ymd(2024, 9, 8));
        assert_eq!(parse_date_text_at("2024-09-08T14:30:00+02:00", r), ymd(2024, 9, 8));
        assert_eq!(parse_date_text_at("2024-09-08T14:30:00Z", r), ymd(2024, 9, 8));
        assert_eq!(parse_date_text_at("September 2024", r), ymd(2024, 9, 1));
        assert_eq!(parse_date_text_at("Sep 2024", r), ymd(2024, 9, 1));
        assert_eq!(parse_date_text_at("2024-09-08", r), ymd(2024, 9, 8));
        assert_eq!(parse_date_text_at("8 September 2024", r), ymd(2024, 9, 8));
    }

    #[test]
    fn test_absolute_inside_snippet() {
        assert_eq!(
            parse_date_text_at("Jan 5, 2024 · The council voted to approve", reference()),
            ymd(2024, 1, 5)
        );
    }

    #[test]
    fn test_no_date() {
        assert_eq!(parse_date_text_at("", reference()), None);
        assert_eq!(parse_date_text_at("www.example.com › news", reference()), None);
        assert_eq!(parse_date_text_at("Foo 32, 2024", reference()), None);
        assert_eq!(parse_date_text_at("Grammar 2024: the complete guide", reference()), None);
        assert_eq!(parse_date_text_at("Dismay 2023 report", reference()), None);
        assert_eq!(parse_date_text_at("Dismay 5, 2023", reference()), None);
    }

    #[test]
    fn test_month_word_after_non_month_word() {
        assert_eq!(parse_date_text_at("Grammar 2024, updated June 2023", reference()), ymd(2023, 6, 1));
        assert_eq!(parse_date_text_at("Published: Mar 2024", reference()), ymd(2024, 3, 1));
    }

    #[test]
    fn test_parse_is_idempotent() {
        for text in ["3 days ago", "Sep 8, 2024", "nothing here", "2024-09-08T14:30:00"] {
            let first = parse_date_text_at(text, reference());
            let second = parse_date_text_at(text, reference());
            assert_eq!(first, second, "{text}");
        }
    }

    #[test]
    fn test_meta_tag_has_priority() {
        let html = r#"
            <html><head>
                <meta property="article:published_time" content="2021-04-02T08:00:00+00:00">
                <script type="application/ld+json">{"datePublished": "2020-01-01"}</script>
            </head><body><time datetime="2019-01-01">old</time></body></html>
        "#;
        assert_eq!(extract_published_date(html), ymd(2021, 4, 2));
    }

    #[test]
    fn test_itemprop_meta() {
        let html = r#"<html><head><meta itemprop="datePublished" content="2022-11-30"></head></html>"#;
        assert_eq!(extract_published_date(html), ymd(2022, 11, 30));
    }

    #[test]
    fn test_json_ld_array_and_bad_block() {
        let html = r#"
            <html><head>
                <script type="application/ld+json">{ not json </script>
                <script type="application/ld+json">
                    [{"@type": "Organization"}, {"@type": "NewsArticle", "dateCreated": "2023-06-01T10:00:00"}]
                </script>
            </head></html>
        "#;
        assert_eq!(extract_published_date(html), ymd(2023, 6, 1));
    }

    #[test]
    fn test_json_ld_graph() {
        let html = r#"
            <script type="application/ld+json">
                {"@context": "https://schema.org", "@graph": [{"@type": "WebPage"}, {"uploadDate": "2020-02-29"}]}
            </script>
        "#;
        assert_eq!(extract_published_date(html), ymd(2020, 2, 29));
    }

    #[test]
    fn test_time_element() {
        let html = r#"<article><time datetime="2018-07-04T09:00:00">July 4</time></article>"#;
        assert_eq!(extract_published_date(html), ymd(2018, 7, 4));
    }

    #[test]
    fn test_heuristic_class() {
        let html = r#"<div><span class="post-date">Published March 3, 2017</span></div>"#;
        assert_eq!(extract_published_date(html), ymd(2017, 3, 3));
    }

    #[test]
    fn test_nothing_on_page() {
        let html = "<html><body><p>No dates at all.</p></body></html>";
        assert_eq!(extract_published_date(html), None);
    }
}
