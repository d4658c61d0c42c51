use inet_common::observability::init_test_tracing;
use inet_http::{FetchError, FetchSettings, PageFetcher};
use inet_web::{HtmlScraper, LinkSelector, ScrapeError, ScrapeRequest, TextFilter};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scraper() -> HtmlScraper {
    let fetcher = PageFetcher::new(FetchSettings {
        timeout: Duration::from_secs(2),
        ..FetchSettings::default()
    })
    .expect("client builds");
    HtmlScraper::new(fetcher)
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn top_level_failure_is_absent_and_fetches_no_about_pages() {
    init_test_tracing();
    let server = MockServer::start().await;
    serve(&server, "/", 500, "").await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let req = ScrapeRequest::new(server.uri());
    assert!(scraper().scrape(&req).await.is_none());
    assert!(matches!(
        scraper().try_scrape(&req).await,
        Err(ScrapeError::Fetch(FetchError::HttpStatus { .. }))
    ));
}

#[tokio::test]
async fn connection_refused_is_absent() {
    init_test_tracing();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let req = ScrapeRequest::new(addr.to_string());
    assert!(scraper().scrape(&req).await.is_none());
}

#[tokio::test]
async fn failed_about_page_is_skipped_and_order_kept() {
    init_test_tracing();
    let server = MockServer::start().await;
    let base = server.uri();
    let home = format!(
        r#"<html><body>
            <a href="{base}/about-1">About</a>
            <a href="{base}/about-2">ABOUT the team</a>
            <a href="{base}/about-3">about history</a>
        </body></html>"#
    );
    serve(&server, "/", 200, &home).await;
    serve(&server, "/about-1", 200, "first").await;
    serve(&server, "/about-2", 404, "gone").await;
    serve(&server, "/about-3", 200, "third").await;

    let result = scraper()
        .scrape(&ScrapeRequest::new(&base))
        .await
        .expect("top-level page succeeded");
    let bodies: Vec<&[u8]> = result.about_pages.iter().map(|b| b.as_ref()).collect();
    assert_eq!(bodies, vec![b"first".as_slice(), b"third".as_slice()]);
    assert!(result.twitter_links.is_empty());
}

#[tokio::test]
async fn no_matching_anchors_yields_empty_result() {
    init_test_tracing();
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        200,
        r#"<a href="/contact">Contact</a><a href="https://facebook.com/acme">fb</a>"#,
    )
    .await;

    let result = scraper()
        .scrape(&ScrapeRequest::new(server.uri()))
        .await
        .expect("present result");
    assert!(result.about_pages.is_empty());
    assert!(result.twitter_links.is_empty());
}

#[tokio::test]
async fn twitter_links_are_collected_not_fetched() {
    init_test_tracing();
    let server = MockServer::start().await;
    let base = server.uri();
    let home = format!(
        r#"<a href="https://twitter.com/acme">Twitter</a>
           <a href="https://facebook.com/acme">Facebook</a>
           <a href="{base}/twitter.com/mirror">mirror</a>"#
    );
    serve(&server, "/", 200, &home).await;
    Mock::given(method("GET"))
        .and(path("/twitter.com/mirror"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = scraper()
        .scrape(&ScrapeRequest::new(&base))
        .await
        .expect("present result");
    assert_eq!(
        result.twitter_links,
        vec![
            "https://twitter.com/acme".to_string(),
            format!("{base}/twitter.com/mirror"),
        ]
    );
    assert_eq!(result.twitter_handles(), vec!["acme"]);
}

#[tokio::test]
async fn flags_disable_each_half() {
    init_test_tracing();
    let server = MockServer::start().await;
    let base = server.uri();
    let home = format!(
        r#"<a href="{base}/about">About</a><a href="https://twitter.com/acme">t</a>"#
    );
    serve(&server, "/", 200, &home).await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string("about page"))
        .expect(1)
        .mount(&server)
        .await;

    let no_about = scraper()
        .scrape(&ScrapeRequest::new(&base).about(false))
        .await
        .unwrap();
    assert!(no_about.about_pages.is_empty());
    assert_eq!(no_about.twitter_links, vec!["https://twitter.com/acme"]);

    let no_twitter = scraper()
        .scrape(&ScrapeRequest::new(&base).twitter_handles(false))
        .await
        .unwrap();
    assert_eq!(no_twitter.about_pages.len(), 1);
    assert!(no_twitter.twitter_links.is_empty());
}

#[tokio::test]
async fn concurrent_fetches_keep_extraction_order() {
    init_test_tracing();
    let server = MockServer::start().await;
    let base = server.uri();
    let home = format!(
        r#"<a href="{base}/slow">about slow</a>
           <a href="{base}/fast">about fast</a>
           <a href="{base}/medium">about medium</a>"#
    );
    serve(&server, "/", 200, &home).await;
    for (route, delay_ms) in [("/slow", 400u64), ("/fast", 0), ("/medium", 150)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(route.trim_start_matches('/'))
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(&server)
            .await;
    }

    let result = scraper()
        .with_max_concurrency(3)
        .scrape(&ScrapeRequest::new(&base))
        .await
        .unwrap();
    let bodies: Vec<&[u8]> = result.about_pages.iter().map(|b| b.as_ref()).collect();
    assert_eq!(
        bodies,
        vec![b"slow".as_slice(), b"fast".as_slice(), b"medium".as_slice()]
    );
}

#[tokio::test]
async fn about_fetches_never_exceed_the_concurrency_cap() {
    init_test_tracing();
    let server = MockServer::start().await;
    let base = server.uri();
    let delay = Duration::from_millis(200);
    let pages = 6;
    let home: String = (0..pages)
        .map(|i| format!(r#"<a href="{base}/about/{i}">About {i}</a>"#))
        .collect();
    serve(&server, "/", 200, &home).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/about/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("us").set_delay(delay))
        .expect(pages as u64)
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = scraper()
        .with_max_concurrency(2)
        .scrape(&ScrapeRequest::new(&base))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.about_pages.len(), pages);
    // Two at a time means three full rounds of the delay.
    assert!(
        elapsed >= delay * (pages as u32 / 2),
        "finished in {elapsed:?}, faster than a cap of 2 allows"
    );
}

#[tokio::test]
async fn hung_about_page_times_out_without_blocking_others() {
    init_test_tracing();
    let server = MockServer::start().await;
    let base = server.uri();
    let home = format!(r#"<a href="{base}/hang">about</a><a href="{base}/ok">about</a>"#);
    serve(&server, "/", 200, &home).await;
    Mock::given(method("GET"))
        .and(path("/hang"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;
    serve(&server, "/ok", 200, "ok").await;

    let fetcher = PageFetcher::new(FetchSettings {
        timeout: Duration::from_millis(300),
        ..FetchSettings::default()
    })
    .unwrap();
    let result = HtmlScraper::new(fetcher)
        .scrape(&ScrapeRequest::new(&base))
        .await
        .unwrap();
    assert_eq!(result.about_pages.len(), 1);
    assert_eq!(result.about_pages[0].as_ref(), b"ok");
}

#[tokio::test]
async fn empty_top_level_body_is_a_parse_failure() {
    init_test_tracing();
    let server = MockServer::start().await;
    serve(&server, "/", 200, "   \n").await;

    let req = ScrapeRequest::new(server.uri());
    assert!(scraper().scrape(&req).await.is_none());
    assert!(matches!(
        scraper().try_scrape(&req).await,
        Err(ScrapeError::Parse { .. })
    ));
}

#[tokio::test]
async fn scheme_less_urls_are_normalized_before_fetching() {
    init_test_tracing();
    let server = MockServer::start().await;
    let host = server.address().to_string();
    let home = format!(r#"<a href="{host}/about-us">About us</a>"#);
    serve(&server, "/home", 200, &home).await;
    serve(&server, "/about-us", 200, "we make widgets").await;

    let result = scraper()
        .scrape(&ScrapeRequest::new(format!("{host}/home")))
        .await
        .expect("http:// was prepended");
    assert_eq!(result.about_pages.len(), 1);
    assert_eq!(result.about_pages[0].as_ref(), b"we make widgets");
}

#[tokio::test]
async fn relative_links_resolve_when_enabled() {
    init_test_tracing();
    let server = MockServer::start().await;
    serve(&server, "/", 200, r#"<a href="/about">About</a>"#).await;
    serve(&server, "/about", 200, "relative about").await;

    let plain = scraper()
        .scrape(&ScrapeRequest::new(server.uri()))
        .await
        .unwrap();
    assert!(plain.about_pages.is_empty(), "http:///about is not fetchable");

    let resolved = scraper()
        .scrape(&ScrapeRequest::new(server.uri()).resolve_relative(true))
        .await
        .unwrap();
    assert_eq!(resolved.about_pages.len(), 1);
}

#[tokio::test]
async fn custom_selectors_replace_defaults() {
    init_test_tracing();
    let server = MockServer::start().await;
    let base = server.uri();
    let home = format!(
        r#"<a href="{base}/about">About</a>
           <nav><a class="team" href="{base}/people">Our people</a></nav>
           <a href="https://mastodon.social/@acme">Mastodon</a>"#
    );
    serve(&server, "/", 200, &home).await;
    serve(&server, "/people", 200, "people").await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let about = LinkSelector::css("nav a")
        .unwrap()
        .with_text(TextFilter::contains_ignore_case("people"));
    let social = LinkSelector::css("a[href*='mastodon']").unwrap();
    let result = scraper()
        .scrape(
            &ScrapeRequest::new(&base)
                .about_selector(about)
                .twitter_selector(social),
        )
        .await
        .unwrap();
    assert_eq!(result.about_pages.len(), 1);
    assert_eq!(result.twitter_links, vec!["https://mastodon.social/@acme"]);
}
