use crate::SearchResult;

/// Returns the result with the earliest publication date.
///
/// Undated entries are ignored; `None` when nothing is dated. On equal dates
/// the first occurrence wins.
pub fn oldest(results: &[SearchResult]) -> Option<&SearchResult> {
    results
        .iter()
        .filter(|r| r.published_date.is_some())
        .min_by_key(|r| r.published_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dated(url: &str, date: Option<&str>) -> SearchResult {
        SearchResult {
            title: url.to_string(),
            url: url.to_string(),
            snippet: String::new(),
            published_date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            original_title: None,
            original_snippet: None,
            source_language: None,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(oldest(&[]).is_none());
    }

    #[test]
    fn test_picks_minimum_date() {
        let results = vec![
            dated("newer", Some("2024-01-05")),
            dated("older", Some("2023-06-01")),
        ];
        assert_eq!(oldest(&results).unwrap().url, "older");
    }

    #[test]
    fn test_tie_keeps_first() {
        let results = vec![
            dated("first", Some("2022-02-02")),
            dated("second", Some("2022-02-02")),
        ];
        assert_eq!(oldest(&results).unwrap().url, "first");
    }

    #[test]
    fn test_undated_entries_ignored() {
        let results = vec![dated("none", None), dated("dated", Some("2020-01-01"))];
        assert_eq!(oldest(&results).unwrap().url, "dated");
        assert!(oldest(&[dated("none", None)]).is_none());
    }
}
