use chrono::NaiveDate;
use mockito::Matcher;
use serp_harvest::config::DelayRange;
use serp_harvest::dates::recover_date_from_page;
use serp_harvest::{
    CancelFlag, Fetcher, HarvestConfig, HarvestRequest, Harvester, HttpFetcher, MarketTable,
    PassthroughTranslator, StopReason,
};
use std::sync::Arc;
use std::time::Duration;

fn config_for(server: &mockito::ServerGuard) -> HarvestConfig {
    HarvestConfig {
        search_endpoint: format!("{}/search", server.url()),
        delay: DelayRange::none(),
        ..HarvestConfig::default()
    }
}

#[tokio::test]
async fn test_http_fetcher_reports_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let ok = server
        .mock("GET", "/page")
        .match_header("accept-language", "en-US,en;q=0.5")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>hello</html>")
        .create_async()
        .await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let fetcher = HttpFetcher::new(&HarvestConfig::default()).unwrap();
    let response = fetcher
        .fetch(&format!("{}/page", server.url()), Duration::from_secs(5))
        .await
        .unwrap();
    ok.assert_async().await;
    assert!(response.is_success());
    assert_eq!(response.body, "<html>hello</html>");

    let missing = fetcher
        .fetch(&format!("{}/missing", server.url()), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(missing.status, 404);
    assert!(!missing.is_success());
}

#[tokio::test]
async fn test_recover_date_from_json_ld_page() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/article")
        .with_status(200)
        .with_body(
            r#"<html><head><script type="application/ld+json">
            {"@context": "https://schema.org", "@graph": [{"@type": "NewsArticle", "datePublished": "2021-07-14T09:30:00+02:00"}]}
            </script></head><body></body></html>"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/gone")
        .with_status(410)
        .create_async()
        .await;

    let fetcher = HttpFetcher::new(&HarvestConfig::default()).unwrap();
    let date = recover_date_from_page(
        &format!("{}/article", server.url()),
        &fetcher,
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(date, NaiveDate::from_ymd_opt(2021, 7, 14));

    let none = recover_date_from_page(
        &format!("{}/gone", server.url()),
        &fetcher,
        Duration::from_secs(5),
    )
    .await;
    assert!(none.is_none());
}

#[tokio::test]
async fn test_full_harvest_against_mock_engine() {
    let mut server = mockito::Server::new_async().await;
    let article_url = format!("{}/story", server.url());
    let reference_url = format!("{}/reference", server.url());

    let first_page = format!(
        r#"<html><body><ol id="b_results">
        <li class="b_algo"><h2><a href="https://news.example/budget">Budget passes</a></h2>
          <div class="b_caption"><p>Mar 2, 2024 · Lawmakers approved the budget.</p></div></li>
        <li class="b_algo"><h2><a href="{article_url}">Feature story</a></h2>
          <div class="b_caption"><p>A long read without a visible date.</p></div></li>
        <li class="b_algo"><h2><a href="{reference_url}">Budget (overview)</a></h2>
          <div class="b_caption"><p>Reference article.</p></div></li>
        </ol></body></html>"#
    );
    let page_one = server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "state budget".into()),
            Matcher::UrlEncoded("first".into(), "1".into()),
            Matcher::UrlEncoded("mkt".into(), "fr-FR".into()),
        ]))
        .with_status(200)
        .with_body(first_page)
        .create_async()
        .await;
    let page_two = server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("first".into(), "11".into()))
        .with_status(200)
        .with_body("<html><body><ol id=\"b_results\"></ol></body></html>")
        .create_async()
        .await;
    server
        .mock("GET", "/story")
        .with_status(200)
        .with_body(r#"<html><body><time datetime="2023-12-24">Christmas Eve</time></body></html>"#)
        .create_async()
        .await;
    server
        .mock("GET", "/reference")
        .with_status(200)
        .with_body("<html><body><p>Timeless overview.</p></body></html>")
        .create_async()
        .await;

    let config = config_for(&server);
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
    let harvester = Harvester::new(
        config,
        fetcher,
        Arc::new(PassthroughTranslator),
        MarketTable::builtin(),
    )
    .unwrap();

    let request = HarvestRequest::new("state budget", 5, 5).with_market("france");
    let outcome = harvester.harvest(&request, &CancelFlag::new()).await;

    page_one.assert_async().await;
    page_two.assert_async().await;
    assert_eq!(outcome.stop_reason, StopReason::EmptyPage);
    assert_eq!(outcome.pages_fetched, 2);

    let dated: Vec<_> = outcome
        .dated
        .iter()
        .map(|r| (r.url.as_str(), r.published_date))
        .collect();
    assert_eq!(
        dated,
        vec![
            ("https://news.example/budget", NaiveDate::from_ymd_opt(2024, 3, 2)),
            (article_url.as_str(), NaiveDate::from_ymd_opt(2023, 12, 24)),
        ]
    );
    assert_eq!(outcome.undated.len(), 1);
    assert_eq!(outcome.undated[0].title, "Budget (overview)");
    assert_eq!(
        serp_harvest::oldest(&outcome.dated).map(|r| r.url.as_str()),
        Some(article_url.as_str())
    );
}

#[tokio::test]
async fn test_server_error_stops_with_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let config = config_for(&server);
    let harvester = Harvester::from_config(config, MarketTable::builtin()).unwrap();
    let outcome = harvester
        .harvest(&HarvestRequest::new("anything", 3, 3), &CancelFlag::new())
        .await;

    assert_eq!(outcome.stop_reason, StopReason::HttpStatus(429));
    assert_eq!(outcome.pages_fetched, 0);
    assert!(outcome.dated.is_empty());
}
