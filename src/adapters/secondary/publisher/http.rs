/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! HTTP publisher for sending insights to a remote collector

use crate::domain::{InsightsRun, PublishConfig, PublishError};
use crate::ports::InsightPublisher;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// HTTP publisher that POSTs each run to the configured endpoint
pub struct HttpInsightPublisher {
    client: Client,
}

impl HttpInsightPublisher {
    /// Create a new HTTP publisher
    ///
    /// # Arguments
    /// * `timeout` - HTTP request timeout
    /// * `skip_tls_verify` - Whether to skip TLS certificate verification
    pub fn new(timeout: Duration, skip_tls_verify: bool) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()
            .map_err(|e| {
                PublishError::NetworkFailed(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// Create with default settings
    pub fn with_defaults() -> Result<Self, PublishError> {
        Self::new(Duration::from_secs(30), false)
    }

    /// Build the request body for a run
    fn create_payload(
        &self,
        run: &InsightsRun,
        config: &PublishConfig,
    ) -> Result<serde_json::Value, PublishError> {
        let serialize =
            |e: serde_json::Error| PublishError::SerializationFailed(e.to_string());

        let mut payload = json!({
            "generatedAt": run.generated_at,
            "hostname": run.hostname,
            "insights": serde_json::to_value(&run.insights).map_err(serialize)?,
            "samples": serde_json::to_value(run.samples()).map_err(serialize)?,
        });

        if !config.labels.is_empty() {
            if let Some(obj) = payload.as_object_mut() {
                obj.insert(
                    "labels".to_string(),
                    serde_json::to_value(&config.labels).map_err(serialize)?,
                );
            }
        }

        Ok(payload)
    }
}

#[async_trait]
impl InsightPublisher for HttpInsightPublisher {
    async fn publish(&self, run: &InsightsRun, config: &PublishConfig) -> Result<(), PublishError> {
        if config.endpoint.is_empty() {
            return Err(PublishError::NetworkFailed(
                "No endpoint URL provided".to_string(),
            ));
        }

        let payload = self.create_payload(run, config)?;
        let mut request = self.client.post(&config.endpoint).json(&payload);

        if let Some(token) = config.resolve_token() {
            request = request.bearer_auth(token);
        }

        debug!("Posting insights to {}", config.endpoint);
        let response = request
            .send()
            .await
            .map_err(|e| PublishError::NetworkFailed(format!("Failed to send request: {e}")))?;

        let status = response.status();
        if status.is_success() {
            info!(
                "Published {} insight samples to {}",
                run.samples().len(),
                config.endpoint
            );
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status.as_u16() == 401 || status.as_u16() == 403 {
            Err(PublishError::AuthenticationFailed(format!(
                "HTTP {status}: {error_text}"
            )))
        } else {
            Err(PublishError::NetworkFailed(format!(
                "HTTP {status}: {error_text}"
            )))
        }
    }

    async fn test_connectivity(&self, config: &PublishConfig) -> Result<bool, PublishError> {
        if config.endpoint.is_empty() {
            return Ok(false);
        }

        let mut request = self.client.head(&config.endpoint);
        if let Some(token) = config.resolve_token() {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            // 405 Method Not Allowed still proves the endpoint is there
            Ok(response) => Ok(response.status().is_success() || response.status().as_u16() == 405),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ruleengine::{
        build_insights, EvalNode, EvalOperation, Insights, KnowledgeBase, Recommendation, Rule,
    };
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn create_test_run() -> InsightsRun {
        let rule = Rule {
            id: "SAP_HANA_INSIGHTS_LOG_MODE".to_string(),
            recommendations: vec![Recommendation {
                id: "rec_log_mode_normal".to_string(),
                description: String::new(),
                trigger: Some(EvalNode::compare(EvalOperation::Eq, "1", "1")),
            }],
            ..Default::default()
        };
        let mut insights = Insights::new();
        build_insights(&rule, &KnowledgeBase::new(), &mut insights);
        InsightsRun::new("hana01".to_string(), 1, 0, insights, vec![])
    }

    /// Serve one HTTP request with `status`, returning the raw request text
    async fn serve_once(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let body = "nope";
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}/insights"), handle)
    }

    #[tokio::test]
    async fn test_http_publisher_creation() {
        let publisher = HttpInsightPublisher::with_defaults();
        assert!(publisher.is_ok());
    }

    #[tokio::test]
    async fn test_create_payload_with_labels() {
        let publisher = HttpInsightPublisher::with_defaults().unwrap();
        let run = create_test_run();

        let mut labels = HashMap::new();
        labels.insert("sid".to_string(), "HXE".to_string());

        let config = PublishConfig {
            endpoint: "http://example.com".to_string(),
            labels,
            ..Default::default()
        };

        let payload = publisher.create_payload(&run, &config).unwrap();
        assert_eq!(payload["labels"]["sid"], "HXE");
        assert_eq!(payload["hostname"], "hana01");
        assert_eq!(
            payload["insights"]["SAP_HANA_INSIGHTS_LOG_MODE"][0]["recommendationId"],
            "rec_log_mode_normal"
        );
        assert_eq!(payload["samples"][0]["result"], true);
    }

    #[tokio::test]
    async fn test_empty_endpoint_error() {
        let publisher = HttpInsightPublisher::with_defaults().unwrap();
        let result = publisher
            .publish(&create_test_run(), &PublishConfig::default())
            .await;
        assert!(matches!(result, Err(PublishError::NetworkFailed(_))));
    }

    #[tokio::test]
    async fn test_publish_sends_bearer_token() {
        let (endpoint, server) = serve_once("200 OK").await;
        let publisher = HttpInsightPublisher::with_defaults().unwrap();
        let config = PublishConfig {
            endpoint,
            auth_token: Some("s3cret".to_string()),
            ..Default::default()
        };

        publisher.publish(&create_test_run(), &config).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /insights"));
        assert!(request
            .to_lowercase()
            .contains("authorization: bearer s3cret"));
        assert!(request.contains("rec_log_mode_normal"));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_failed() {
        let (endpoint, server) = serve_once("401 Unauthorized").await;
        let publisher = HttpInsightPublisher::with_defaults().unwrap();
        let config = PublishConfig {
            endpoint,
            ..Default::default()
        };

        let result = publisher.publish(&create_test_run(), &config).await;
        server.await.unwrap();
        match result {
            Err(PublishError::AuthenticationFailed(message)) => assert!(message.contains("nope")),
            other => panic!("expected authentication failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connectivity_without_endpoint() {
        let publisher = HttpInsightPublisher::with_defaults().unwrap();
        assert!(!publisher
            .test_connectivity(&PublishConfig::default())
            .await
            .unwrap());
    }
}
