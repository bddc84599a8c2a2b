use std::time::Duration;
use structify_common::DEFAULT_USER_AGENT;
use structify_web::fetch::{FetchError, FetchMode, Fetcher, StaticFetcher};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{p}", server.uri())).unwrap()
}

#[tokio::test]
async fn sends_browser_user_agent_and_reads_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quotes"))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("<h1>Quotes</h1>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let doc = StaticFetcher::with_defaults()
        .unwrap()
        .fetch(&url(&server, "/quotes"))
        .await
        .unwrap();
    assert_eq!(doc.html, "<h1>Quotes</h1>");
    assert_eq!(doc.fetched_via, FetchMode::Static);
    assert_eq!(doc.source_url.path(), "/quotes");
}

#[tokio::test]
async fn non_success_status_is_http_status_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = StaticFetcher::with_defaults()
        .unwrap()
        .fetch(&url(&server, "/missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status, .. } if status.as_u16() == 404));
    assert!(err.to_string().starts_with("HTTP Error: 404"));
}

#[tokio::test]
async fn slow_server_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let fetcher = StaticFetcher::new(DEFAULT_USER_AGENT, Duration::from_millis(50)).unwrap();
    let err = fetcher.fetch(&url(&server, "/slow")).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)), "got {err:?}");
    assert!(err.to_string().starts_with("Timeout Error: "));
}

#[tokio::test]
async fn refused_connection_is_connection_failure() {
    let fetcher = StaticFetcher::with_defaults().unwrap();
    let err = fetcher
        .fetch(&Url::parse("http://127.0.0.1:9/").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::ConnectionFailure(_)), "got {err:?}");
}
