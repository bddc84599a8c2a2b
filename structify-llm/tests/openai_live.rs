mod common;
use structify_llm::extract::{Extraction, ExtractionSettings, Extractor};
use structify_llm::openai::OpenAiClient;
use structify_llm::schema::presets;
use std::sync::Arc;

const MODEL: &str = "gpt-3.5-turbo-1106";

fn make_client_or_skip() -> Option<OpenAiClient> {
    let Ok(key) = std::env::var("OPENAI_API_KEY") else {
        tracing::debug!("Skipping: OPENAI_API_KEY not set");
        return None;
    };
    Some(
        OpenAiClient::new(key, MODEL.to_string(), structify_common::DEFAULT_OPENAI_BASE_URL)
            .expect("should work"),
    )
}

#[tokio::test]
#[ignore]
async fn openai_extract_smoketest() {
    common::init_test_tracing();
    let Some(client) = make_client_or_skip() else {
        return;
    };

    let extractor = Extractor::new(Arc::new(client), ExtractionSettings::default());
    let content = "Quotes to Scrape \"The world as we have created it is a process of our thinking.\" by Albert Einstein change deep-thoughts thinking world";
    let out = extractor
        .extract(content, &presets::quotes())
        .await
        .expect("extraction");

    match out {
        Extraction::Success(value) => {
            tracing::debug!("OpenAI response is: {value}");
            assert!(value["quotes"].is_array());
        }
        Extraction::SoftFailure => panic!("no result after retries"),
    }
}
