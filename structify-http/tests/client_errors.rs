use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use structify_http::{HttpClient, HttpError, RequestOpts};
use wiremock::matchers::{bearer_token, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_text_returns_body_regardless_of_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "structify-test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_string("<p>hi</p>"),
        )
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("structify-test"));
    let client = HttpClient::unanchored().unwrap();
    let body = client
        .get_text(
            &format!("{}/page", server.uri()),
            RequestOpts {
                headers: Some(headers),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(body, "<p>hi</p>");
}

#[tokio::test]
async fn non_success_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_text("missing", RequestOpts::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn rate_limit_status_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .and(bearer_token("sk-test"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_string(r#"{"error":{"message":"slow down"}}"#),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/v1/", server.uri())).unwrap();
    let err = client
        .post_json_opts::<_, serde_json::Value>(
            "chat",
            &serde_json::json!({"x": 1}),
            RequestOpts {
                bearer: Some("sk-test"),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
    match err {
        HttpError::Api { message, .. } => assert_eq!(message, "slow down"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri())
        .unwrap()
        .with_timeout(Duration::from_millis(100));
    let err = client
        .get_text("slow", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    // Grab a free port, then release it so nothing is listening there.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = HttpClient::unanchored().unwrap();
    let err = client
        .get_text(&format!("http://127.0.0.1:{port}/"), RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Connect(_)), "got {err:?}");
    assert!(err.is_transport());
}
