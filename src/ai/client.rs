use crate::config::Config;
use crate::error::WorkbenchError;
use async_trait::async_trait;
use serde_json::{json, Value};

const TEMPERATURE: f64 = 0.7;
const TOP_K: u32 = 40;
const TOP_P: f64 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Longest slice of an error body carried into a `Status` error.
const ERROR_DETAIL_CHARS: usize = 200;

/// One outbound call to a generative-language model: prompt text in, raw text out.
///
/// Implementations make exactly one request per call and never retry.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, WorkbenchError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, WorkbenchError> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            client: reqwest::Client::builder().timeout(config.timeout).build()?,
            api_key,
            api_url: config.api_url.clone(),
        })
    }

    fn payload(prompt: &str) -> Value {
        json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "topK": TOP_K,
                "topP": TOP_P,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        })
    }
}

#[async_trait]
impl ModelGateway for GeminiClient {
    async fn invoke(&self, prompt: &str) -> Result<String, WorkbenchError> {
        log::info!("Calling Gemini API with prompt length: {}", prompt.len());

        let res = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::payload(prompt))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            log::error!("Gemini API error: status {status}");
            let detail: String = body.chars().take(ERROR_DETAIL_CHARS).collect();
            return Err(WorkbenchError::Status {
                status: status.as_u16(),
                message: detail,
            });
        }

        extract_text(&body)
    }
}

/// Pulls the single candidate's text part out of a successful response body.
fn extract_text(body: &str) -> Result<String, WorkbenchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| WorkbenchError::MalformedResponse(format!("body is not JSON: {e}")))?;

    value["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            log::error!("Unexpected Gemini API response structure: {value}");
            WorkbenchError::MalformedResponse("no candidate text part in response".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> Config {
        Config {
            api_key: Some("test-key".into()),
            api_url: url,
            timeout: Duration::from_secs(5),
            store_dir: PathBuf::from("."),
        }
    }

    fn candidate(text: &str) -> Value {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[test]
    fn requires_api_key() {
        let mut config = test_config("http://localhost".into());
        config.api_key = None;
        assert!(matches!(
            GeminiClient::new(&config),
            Err(WorkbenchError::Config(_))
        ));
    }

    #[tokio::test]
    async fn sends_prompt_with_fixed_generation_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": "hello" }] }],
                "generationConfig": {
                    "temperature": 0.7,
                    "topK": 40,
                    "topP": 0.95,
                    "maxOutputTokens": 2048
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("  hi there\n")))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(format!("{}/generate", server.uri()))).unwrap();
        let text = client.invoke("hello").await.unwrap();
        assert_eq!(text, "  hi there\n");
    }

    #[tokio::test]
    async fn non_success_status_is_a_status_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(server.uri())).unwrap();
        match client.invoke("hello").await {
            Err(WorkbenchError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_candidate_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(server.uri())).unwrap();
        let err = client.invoke("hello").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::MalformedResponse(_)));
        assert!(err.is_gateway());
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(matches!(
            extract_text("<html>"),
            Err(WorkbenchError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn long_error_bodies_are_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("x".repeat(1000)))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(server.uri())).unwrap();
        match client.invoke("hello").await {
            Err(WorkbenchError::Status { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message.len(), ERROR_DETAIL_CHARS);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
