//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full fetch / extract / paginate cycle end-to-end.

use pagetrail::config::{load_config, ExtractRule, HttpOptions, PaginationRule};
use pagetrail::crawler::{CrawlEngine, CrawlError, FieldValue, Termination, Transport};
use pagetrail::output::{CsvSink, JsonSink, RecordSink};
use pagetrail::query::QueryKind;
use pagetrail::{CrawlSpec, FetchError};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// HTTP options with no pacing and tiny backoff so tests run fast
fn fast_http() -> HttpOptions {
    HttpOptions {
        delay: 0.0,
        timeout: 2.0,
        max_retries: 3,
        backoff: 0.01,
        headers: BTreeMap::new(),
    }
}

fn css_rule(field: &str, selector: &str) -> ExtractRule {
    ExtractRule {
        field: field.to_string(),
        kind: QueryKind::Css,
        selector: selector.to_string(),
        attr: None,
        multiple: false,
    }
}

fn create_test_spec(start_url: String, pagination: Option<PaginationRule>) -> CrawlSpec {
    CrawlSpec {
        start_url,
        extract_rules: vec![css_rule("title", "h1")],
        pagination,
        http: fast_http(),
    }
}

fn css_pagination(selector: &str, max_pages: u32) -> Option<PaginationRule> {
    Some(PaginationRule {
        max_pages,
        kind: QueryKind::Css,
        next_page_selector: selector.to_string(),
    })
}

/// A page with a title and an optional "next" link
fn page_html(title: &str, next: Option<&str>) -> String {
    let next = next
        .map(|href| format!(r#"<a class="next" href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>",
        title, title, next
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected_hits)
        .mount(server)
        .await;
}

fn titles(pages: &[pagetrail::PageResult]) -> Vec<String> {
    pages
        .iter()
        .map(|page| {
            page.record
                .get("title")
                .and_then(FieldValue::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_single_page_extraction() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        r#"<html><body><h1 class="title">Hello</h1></body></html>"#.to_string(),
        1,
    )
    .await;

    let mut spec = create_test_spec(format!("{}/", mock_server.uri()), None);
    spec.extract_rules = vec![css_rule("title", "h1.title")];
    let report = CrawlEngine::new(spec).unwrap().run().await.expect("Crawl failed");

    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].page_number, 1);
    assert_eq!(report.termination, Termination::NoPaginationRule);
    assert!(report.finished_at >= report.started_at);

    let dir = tempfile::TempDir::new().unwrap();
    let json_path = dir.path().join("out.json");
    JsonSink::new(&json_path).write(&report.pages).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json, serde_json::json!([{"title": "Hello"}]));
}

#[tokio::test]
async fn test_page_limit_stops_endless_chain() {
    let mock_server = MockServer::start().await;
    for n in 1..=3 {
        mount_page(
            &mock_server,
            &format!("/page/{}", n),
            page_html(&format!("Page {}", n), Some(&format!("/page/{}", n + 1))),
            1,
        )
        .await;
    }
    mount_page(&mock_server, "/page/4", page_html("Page 4", Some("/page/5")), 0).await;

    let spec = create_test_spec(
        format!("{}/page/1", mock_server.uri()),
        css_pagination("a.next", 3),
    );
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();

    assert_eq!(titles(&report.pages), vec!["Page 1", "Page 2", "Page 3"]);
    assert_eq!(
        report.pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(report.termination, Termination::PageLimitReached(3));
}

#[tokio::test]
async fn test_cycle_is_not_refetched() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/p/1", page_html("One", Some("/p/2")), 1).await;
    mount_page(&mock_server, "/p/2", page_html("Two", Some("/p/3")), 1).await;
    mount_page(&mock_server, "/p/3", page_html("Three", Some("/p/1")), 1).await;

    let start = format!("{}/p/1", mock_server.uri());
    let spec = create_test_spec(start.clone(), css_pagination("a.next", 10));
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();

    assert_eq!(titles(&report.pages), vec!["One", "Two", "Three"]);
    assert_eq!(
        report.termination,
        Termination::CycleDetected(url::Url::parse(&start).unwrap())
    );
}

#[tokio::test]
async fn test_disabled_next_link_is_not_followed() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/p/1",
        r#"<h1>Last</h1><a class="next disabled" href="/p/2">Next</a>"#.to_string(),
        1,
    )
    .await;
    mount_page(&mock_server, "/p/2", page_html("Never", None), 0).await;

    let spec = create_test_spec(
        format!("{}/p/1", mock_server.uri()),
        css_pagination("a.next", 10),
    );
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();

    assert_eq!(titles(&report.pages), vec!["Last"]);
    assert!(matches!(report.termination, Termination::InvalidNextLink(_)));
}

#[tokio::test]
async fn test_missing_next_link_ends_run() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/p/1", page_html("Only", None), 1).await;

    let spec = create_test_spec(
        format!("{}/p/1", mock_server.uri()),
        css_pagination("a.next", 10),
    );
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();

    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.termination, Termination::NoNextPage);
}

#[tokio::test]
async fn test_relative_links_resolve_against_current_page() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/list/index.html", page_html("Index", Some("page2.html")), 1).await;
    mount_page(&mock_server, "/list/page2.html", page_html("Second", Some("../list/page3.html")), 1).await;
    mount_page(&mock_server, "/list/page3.html", page_html("Third", None), 1).await;

    let spec = create_test_spec(
        format!("{}/list/index.html", mock_server.uri()),
        css_pagination("a.next", 10),
    );
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();

    assert_eq!(titles(&report.pages), vec!["Index", "Second", "Third"]);
    assert_eq!(
        report.pages[2].url.as_str(),
        format!("{}/list/page3.html", mock_server.uri())
    );
}

#[tokio::test]
async fn test_redirect_updates_base_url() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/archive/1"))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/archive/1", page_html("Archive 1", Some("2")), 1).await;
    mount_page(&mock_server, "/archive/2", page_html("Archive 2", None), 1).await;

    let spec = create_test_spec(
        format!("{}/start", mock_server.uri()),
        css_pagination("a.next", 10),
    );
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();

    assert_eq!(titles(&report.pages), vec!["Archive 1", "Archive 2"]);
    assert_eq!(report.pages[0].url.path(), "/archive/1");
}

#[tokio::test]
async fn test_xpath_pagination_and_fields() {
    let mock_server = MockServer::start().await;
    let body = |n: u32, next: Option<&str>| {
        let link = next
            .map(|href| format!(r#"<ul><li class="pager-next"><a href="{}">more</a></li></ul>"#, href))
            .unwrap_or_default();
        format!(
            r#"<div class="item"><span>a{n}</span></div><div class="item"><span>b{n}</span></div>{link}"#,
            n = n,
            link = link
        )
    };
    // Mounted first: the plain path matcher below would also match this query
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body(2, None)))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/feed", body(1, Some("/feed?page=2")), 1).await;

    let spec = CrawlSpec {
        start_url: format!("{}/feed", mock_server.uri()),
        extract_rules: vec![ExtractRule {
            field: "items".to_string(),
            kind: QueryKind::Xpath,
            selector: "//div[@class='item']/span".to_string(),
            attr: None,
            multiple: true,
        }],
        pagination: Some(PaginationRule {
            max_pages: 5,
            kind: QueryKind::Xpath,
            next_page_selector: "//li[@class='pager-next']/a/@href".to_string(),
        }),
        http: fast_http(),
    };

    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();
    assert_eq!(report.pages.len(), 2);
    assert_eq!(
        report.pages[1].record.get("items"),
        Some(&FieldValue::Multiple(vec!["a2".to_string(), "b2".to_string()]))
    );
    assert_eq!(report.termination, Termination::NoNextPage);
}

#[tokio::test]
async fn test_transient_errors_are_retried_with_backoff() {
    let mock_server = MockServer::start().await;

    // Mounted first, so it wins until exhausted
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/flaky", page_html("Recovered", None), 1).await;

    let transport = Transport::new(&fast_http()).unwrap();
    let page = transport
        .fetch(&format!("{}/flaky", mock_server.uri()), None)
        .await
        .expect("Fetch should succeed after retries");

    assert_eq!(page.status, 200);
    assert_eq!(page.attempts, 4);
    assert_eq!(page.retry_waits.len(), 3);
    assert_eq!(page.retry_waits[1], page.retry_waits[0] * 2);
    assert_eq!(page.retry_waits[2], page.retry_waits[0] * 4);
    assert!(page.body.contains("Recovered"));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&mock_server)
        .await;

    let transport = Transport::new(&fast_http()).unwrap();
    let error = transport
        .fetch(&format!("{}/down", mock_server.uri()), None)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        FetchError::ServerStatus {
            status: 503,
            attempts: 4,
            ..
        }
    ));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = Transport::new(&fast_http()).unwrap();
    let error = transport
        .fetch(&format!("{}/missing", mock_server.uri()), None)
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::ClientStatus { status: 404, .. }));
    assert!(!error.is_retryable());
    assert_eq!(error.attempts(), 1);
}

#[tokio::test]
async fn test_timeout_is_retried_then_reported() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<h1>late</h1>")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let options = HttpOptions {
        timeout: 0.1,
        max_retries: 1,
        ..fast_http()
    };
    let transport = Transport::new(&options).unwrap();
    let error = transport
        .fetch(&format!("{}/slow", mock_server.uri()), None)
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Timeout { attempts: 2, .. }), "{:?}", error);
}

#[tokio::test]
async fn test_start_url_failure_yields_no_records() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&mock_server)
        .await;

    let spec = create_test_spec(format!("{}/gone", mock_server.uri()), css_pagination("a.next", 5));
    let error = CrawlEngine::new(spec).unwrap().run().await.unwrap_err();

    match error {
        CrawlError::Fetch {
            page,
            source,
            committed,
        } => {
            assert_eq!(page, 1);
            assert_eq!(source.status(), Some(410));
            assert!(committed.is_empty());
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_mid_run_failure_keeps_committed_pages() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/p/1", page_html("One", Some("/p/2")), 1).await;
    Mock::given(method("GET"))
        .and(path("/p/2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let spec = create_test_spec(
        format!("{}/p/1", mock_server.uri()),
        css_pagination("a.next", 5),
    );
    let error = CrawlEngine::new(spec).unwrap().run().await.unwrap_err();

    assert!(matches!(error, CrawlError::Fetch { page: 2, .. }));
    assert_eq!(titles(error.committed_pages()), vec!["One"]);
}

#[tokio::test]
async fn test_cancellation_discards_in_flight_page() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/p/1", page_html("One", Some("/p/2")), 1).await;
    Mock::given(method("GET"))
        .and(path("/p/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page_html("Two", None))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let token = CancellationToken::new();
    let spec = create_test_spec(
        format!("{}/p/1", mock_server.uri()),
        css_pagination("a.next", 5),
    );
    let engine = CrawlEngine::new(spec).unwrap().with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });

    let started = Instant::now();
    let report = engine.run().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(titles(&report.pages), vec!["One"]);
    assert_eq!(report.termination, Termination::Cancelled);
}

#[tokio::test]
async fn test_delay_paces_consecutive_fetches() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/p/1", page_html("One", Some("/p/2")), 1).await;
    mount_page(&mock_server, "/p/2", page_html("Two", None), 1).await;

    let mut spec = create_test_spec(
        format!("{}/p/1", mock_server.uri()),
        css_pagination("a.next", 5),
    );
    spec.http.delay = 0.5;

    let started = Instant::now();
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.pages.len(), 2);
    // Exactly one jittered delay: two would take at least 2 x 400ms
    assert!(elapsed >= Duration::from_millis(400), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(800), "{:?}", elapsed);
}

#[tokio::test]
async fn test_first_fetch_is_not_delayed() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", page_html("Only", None), 1).await;

    let mut spec = create_test_spec(format!("{}/", mock_server.uri()), None);
    spec.http.delay = 5.0;

    let started = Instant::now();
    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();

    assert_eq!(titles(&report.pages), vec!["Only"]);
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
}

#[tokio::test]
async fn test_xpath_evaluation_error_aborts_run() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", page_html("Only", None), 1).await;

    let mut spec = create_test_spec(format!("{}/", mock_server.uri()), None);
    spec.extract_rules = vec![ExtractRule {
        kind: QueryKind::Xpath,
        ..css_rule("title", "//h1[contains(.)]")
    }];

    let err = CrawlEngine::new(spec).unwrap().run().await.unwrap_err();
    assert!(matches!(
        err,
        CrawlError::Config(pagetrail::ConfigError::Selector { ref field, .. }) if field == "title"
    ));
    assert!(err.committed_pages().is_empty());
}

#[tokio::test]
async fn test_pagination_evaluation_error_aborts_run() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", page_html("One", Some("/2")), 1).await;

    let pagination = Some(PaginationRule {
        max_pages: 5,
        kind: QueryKind::Xpath,
        next_page_selector: "//a[starts-with(@href)]".to_string(),
    });
    let spec = create_test_spec(format!("{}/", mock_server.uri()), pagination);

    let err = CrawlEngine::new(spec).unwrap().run().await.unwrap_err();
    assert!(matches!(
        err,
        CrawlError::Config(pagetrail::ConfigError::Selector { ref field, .. }) if field == "pagination"
    ));
}

#[tokio::test]
async fn test_configured_headers_are_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>ok</h1>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut spec = create_test_spec(format!("{}/", mock_server.uri()), None);
    spec.http.headers.insert("X-Api-Key".to_string(), "secret".to_string());

    let report = CrawlEngine::new(spec).unwrap().run().await.unwrap();
    assert_eq!(titles(&report.pages), vec!["ok"]);
}

#[tokio::test]
async fn test_engine_runs_are_independent() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/p/1", page_html("One", Some("/p/2")), 2).await;
    mount_page(&mock_server, "/p/2", page_html("Two", None), 2).await;

    let spec = create_test_spec(
        format!("{}/p/1", mock_server.uri()),
        css_pagination("a.next", 5),
    );
    let engine = CrawlEngine::new(spec).unwrap();

    let first = engine.run().await.unwrap();
    let second = engine.run().await.unwrap();
    assert_eq!(titles(&first.pages), titles(&second.pages));
}

#[tokio::test]
async fn test_config_file_to_output_files() {
    let mock_server = MockServer::start().await;
    let quotes = |n: u32, next: Option<&str>| {
        let next = next
            .map(|href| format!(r#"<li class="next"><a href="{}">Next</a></li>"#, href))
            .unwrap_or_default();
        format!(
            r#"<div class="quote"><span class="text">Quote {n}a</span><a class="tag">t{n}</a><a class="tag">u{n}</a></div>
               <div class="quote"><span class="text">Quote {n}b</span></div>
               <ul class="pager">{next}</ul>"#,
            n = n,
            next = next
        )
    };
    mount_page(&mock_server, "/page/1/", quotes(1, Some("/page/2/")), 1).await;
    mount_page(&mock_server, "/page/2/", quotes(2, None), 1).await;

    let dir = tempfile::TempDir::new().unwrap();
    let config_path = dir.path().join("quotes.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
name = "quotes"
start_url = "{}/page/1/"
delay = 0.0
backoff = 0.01

[[extract_rules]]
field = "first_quote"
selector = "span.text"

[[extract_rules]]
field = "tags"
selector = "a.tag"
multiple = true

[pagination]
next_page_selector = "li.next > a"
max_pages = 10
"#,
        mock_server.uri()
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let report = CrawlEngine::new(config.spec).unwrap().run().await.unwrap();
    assert_eq!(report.pages.len(), 2);

    let json_path = dir.path().join("out/quotes.json");
    JsonSink::new(&json_path).write(&report.pages).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"first_quote": "Quote 1a", "tags": ["t1", "u1"]},
            {"first_quote": "Quote 2a", "tags": ["t2", "u2"]}
        ])
    );

    let csv_path = dir.path().join("out/quotes.csv");
    CsvSink::new(&csv_path).write(&report.pages).unwrap();
    let csv_text = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv_text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines, vec!["first_quote,tags", "Quote 1a,t1; u1", "Quote 2a,t2; u2"]);
}
