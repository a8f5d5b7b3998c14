// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external classification service.
//!
//! `POST {endpoint}/classify` with `{"text", "task"}` returns an analysis
//! object; `POST {endpoint}/generate` with `{"prompt"}` returns `{"text"}`.

use std::time::Duration;

use async_trait::async_trait;
use leadwise_core::types::{AdapterType, AnalysisResult, HealthStatus};
use leadwise_core::{Classifier, LeadwiseError, PluginAdapter};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    task: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// Classifier backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpClassifier {
    /// Builds a client for `endpoint`, sending `api_key` as a bearer token.
    pub fn new(endpoint: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, LeadwiseError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                LeadwiseError::Config(format!("invalid classifier API key header value: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LeadwiseError::Classifier {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            max_retries: 1,
        })
    }

    /// POSTs `body` to `{base_url}/{route}`, retrying once on transient status codes.
    async fn post_json<B: Serialize + ?Sized, R: serde::de::DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<R, LeadwiseError> {
        let url = format!("{}/{route}", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, route, "retrying classifier request after transient error");
                tokio::time::sleep(Duration::from_millis(250)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| LeadwiseError::Classifier {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, route, "classifier response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| LeadwiseError::Classifier {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&body).map_err(|e| LeadwiseError::Classifier {
                    message: format!("malformed classifier response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            let error = LeadwiseError::classifier(format!("classifier returned {status}: {body}"));
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, "transient classifier error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error
            .unwrap_or_else(|| LeadwiseError::classifier("classifier request failed after retries")))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[async_trait]
impl PluginAdapter for HttpClassifier {
    fn name(&self) -> &str {
        "http-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        Ok(())
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str, task_hint: &str) -> Result<AnalysisResult, LeadwiseError> {
        let mut result: AnalysisResult = self
            .post_json(
                "classify",
                &ClassifyRequest {
                    text,
                    task: task_hint,
                },
            )
            .await?;
        result.sentiment_score = result.sentiment_score.clamp(0.0, 1.0);
        result.confidence = result.confidence.clamp(0.0, 1.0);
        Ok(result)
    }

    async fn generate(&self, prompt: &str) -> Result<String, LeadwiseError> {
        let response: GenerateResponse = self
            .post_json("generate", &GenerateRequest { prompt })
            .await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadwise_core::traits::classifier::SENTIMENT_INTENT_URGENCY;
    use leadwise_core::types::{Sentiment, Urgency};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> HttpClassifier {
        HttpClassifier::new(&server.uri(), Some("test-key"), Duration::from_secs(5)).unwrap()
    }

    fn analysis_body() -> serde_json::Value {
        serde_json::json!({
            "sentiment": "positive",
            "sentimentScore": 0.92,
            "intent": "booking",
            "urgency": "high",
            "keywords": ["session", "tomorrow"],
            "confidence": 0.88
        })
    }

    #[tokio::test]
    async fn classify_sends_task_and_parses_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "text": "Can I book a session tomorrow?",
                "task": "sentiment_intent_urgency"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(analysis_body()))
            .mount(&server)
            .await;

        let result = test_client(&server)
            .classify("Can I book a session tomorrow?", SENTIMENT_INTENT_URGENCY)
            .await
            .unwrap();
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.urgency, Urgency::High);
        assert_eq!(result.intent, "booking");
        assert_eq!(result.keywords, vec!["session", "tomorrow"]);
    }

    #[tokio::test]
    async fn classify_retries_once_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(analysis_body()))
            .mount(&server)
            .await;

        let result = test_client(&server).classify("hi", SENTIMENT_INTENT_URGENCY).await;
        assert!(result.is_ok(), "should succeed after retry: {result:?}");
    }

    #[tokio::test]
    async fn malformed_body_is_a_classifier_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .classify("hi", SENTIMENT_INTENT_URGENCY)
            .await
            .unwrap_err();
        assert!(matches!(err, LeadwiseError::Classifier { .. }));
    }

    #[tokio::test]
    async fn out_of_range_scores_are_clamped() {
        let server = MockServer::start().await;
        let mut body = analysis_body();
        body["sentimentScore"] = serde_json::json!(1.7);
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let result = test_client(&server)
            .classify("hi", SENTIMENT_INTENT_URGENCY)
            .await
            .unwrap();
        assert_eq!(result.sentiment_score, 1.0);
    }

    #[tokio::test]
    async fn generate_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "Hello!"})),
            )
            .mount(&server)
            .await;

        let text = test_client(&server).generate("Write a greeting").await.unwrap();
        assert_eq!(text, "Hello!");
    }
}
