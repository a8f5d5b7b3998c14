// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Transport`] backed by the HTTP session gateway that owns each tenant's
//! WhatsApp session.
//!
//! `POST {gateway}/sessions/{tenant}/messages` sends text and returns
//! `{"id"}`; `GET {gateway}/sessions/{tenant}/status` returns
//! `{"connected"}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use leadwise_config::model::WhatsAppConfig;
use leadwise_core::types::{AdapterType, DeliveryReceipt, HealthStatus};
use leadwise_core::{LeadwiseError, PluginAdapter, Transport};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    connected: bool,
}

/// Sends chat messages through the session gateway.
#[derive(Debug, Clone)]
pub struct GatewayTransport {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl GatewayTransport {
    /// Builds a transport for `gateway_url`, sending `api_token` as a bearer token.
    pub fn new(
        gateway_url: &str,
        api_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, LeadwiseError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                LeadwiseError::Config(format!("invalid gateway token header value: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LeadwiseError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: gateway_url.trim_end_matches('/').to_string(),
            max_retries: 1,
        })
    }

    /// Builds a transport from the `[whatsapp]` config section.
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, LeadwiseError> {
        Self::new(
            &config.gateway_url,
            config.api_token.as_deref(),
            Duration::from_secs(30),
        )
    }

    fn session_url(&self, tenant_id: &str, route: &str) -> String {
        format!("{}/sessions/{tenant_id}/{route}", self.base_url)
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[async_trait]
impl PluginAdapter for GatewayTransport {
    fn name(&self) -> &str {
        "whatsapp-gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwiseError> {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(resp) if resp.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(resp) => Ok(HealthStatus::Degraded(format!(
                "gateway returned {}",
                resp.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("gateway unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), LeadwiseError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    async fn send(
        &self,
        tenant_id: &str,
        recipient: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, LeadwiseError> {
        let url = self.session_url(tenant_id, "messages");
        let request = SendRequest {
            to: recipient,
            text: body,
        };
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, tenant_id, "retrying gateway send after transient error");
                tokio::time::sleep(Duration::from_millis(250)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| LeadwiseError::Transport {
                    message: format!("gateway request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, tenant_id, "gateway send response received");

            if status.is_success() {
                let sent: SendResponse =
                    response.json().await.map_err(|e| LeadwiseError::Transport {
                        message: format!("malformed gateway response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return Ok(DeliveryReceipt {
                    message_id: sent.id,
                    accepted_at: Utc::now(),
                });
            }

            let text = response.text().await.unwrap_or_default();
            let error = LeadwiseError::transport(format!("gateway returned {status}: {text}"));
            if is_transient_error(status) && attempt < self.max_retries {
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| LeadwiseError::transport("gateway send failed after retries")))
    }

    async fn is_connected(&self, tenant_id: &str) -> bool {
        let url = self.session_url(tenant_id, "status");
        let response = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!(status = %resp.status(), tenant_id, "session status not available");
                return false;
            }
            Err(e) => {
                warn!(error = %e, tenant_id, "session status request failed");
                return false;
            }
        };
        response
            .json::<StatusResponse>()
            .await
            .map(|s| s.connected)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> GatewayTransport {
        GatewayTransport::new(&server.uri(), Some("gw-token"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn send_posts_to_tenant_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/tenant-a/messages"))
            .and(header("authorization", "Bearer gw-token"))
            .and(body_json(serde_json::json!({"to": "15551234567", "text": "Welcome!"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "wamid.1"})))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = transport(&server)
            .send("tenant-a", "15551234567", "Welcome!")
            .await
            .unwrap();
        assert_eq!(receipt.message_id, "wamid.1");
    }

    #[tokio::test]
    async fn send_retries_once_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/t/messages"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sessions/t/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "wamid.2"})))
            .mount(&server)
            .await;

        let receipt = transport(&server).send("t", "1", "hi").await.unwrap();
        assert_eq!(receipt.message_id, "wamid.2");
    }

    #[tokio::test]
    async fn send_fails_on_client_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/t/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad recipient"))
            .expect(1)
            .mount(&server)
            .await;

        let err = transport(&server).send("t", "1", "hi").await.unwrap_err();
        assert!(matches!(err, LeadwiseError::Transport { .. }));
        assert!(err.to_string().contains("bad recipient"));
    }

    #[tokio::test]
    async fn is_connected_reads_session_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/up/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"connected": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/down/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"connected": false})))
            .mount(&server)
            .await;

        let transport = transport(&server);
        assert!(transport.is_connected("up").await);
        assert!(!transport.is_connected("down").await);
        // Unknown session: 404 from the mock server.
        assert!(!transport.is_connected("missing").await);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_unhealthy() {
        let transport =
            GatewayTransport::new("http://127.0.0.1:1", None, Duration::from_millis(200)).unwrap();
        assert!(matches!(
            transport.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        assert!(!transport.is_connected("t").await);
    }
}
