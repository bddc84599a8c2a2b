mod common;

use serde_json::json;
use structify_llm::openai::OpenAiClient;
use structify_llm::traits::{
    ChatMessage, CompletionErrorKind, CompletionRequest, LlmClient,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
        temperature: 0.125,
        json_object: true,
        max_tokens: None,
    }
}

async fn client_for(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(
        "sk-test".into(),
        "gpt-3.5-turbo-1106".into(),
        &format!("{}/v1", server.uri()),
    )
    .unwrap()
}

#[tokio::test]
async fn posts_json_object_request_with_bearer_auth() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo-1106",
            "temperature": 0.125,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "model": "gpt-3.5-turbo-1106",
            "choices": [{
                "message": {"role": "assistant", "content": "{\"name\":\"x\",\"data\":[]}"},
                "finish_reason": "stop"
            }],
            "usage": {"total_tokens": 42}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server).await.complete(&request()).await.unwrap();
    assert_eq!(resp.text, "{\"name\":\"x\",\"data\":[]}");
    assert_eq!(resp.tokens_used, Some(42));
}

#[tokio::test]
async fn classifies_rate_limit_and_server_errors() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let limited = client.complete(&request()).await.unwrap_err();
    assert_eq!(limited.kind, CompletionErrorKind::RateLimited);

    let fatal = client.complete(&request()).await.unwrap_err();
    assert_eq!(fatal.kind, CompletionErrorKind::FatalApi);
}

#[tokio::test]
async fn empty_choices_are_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .complete(&request())
        .await
        .unwrap_err();
    assert_eq!(err.kind, CompletionErrorKind::FatalApi);
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    let client = OpenAiClient::new("sk-test".into(), "m".into(), "http://127.0.0.1:9/v1").unwrap();
    let err = client.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind, CompletionErrorKind::TransientConnectivity);
}
