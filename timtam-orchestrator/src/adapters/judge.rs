//! Judgment client for an Anthropic-style messages endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use timtam_core::error::JudgeError;
use timtam_core::traits::{JudgeClient, MetricsSink, metric};
use timtam_core::types::{Decision, JudgeResult};
use tracing::{debug, warn};

use crate::config::JudgeConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

pub struct HttpJudgeClient {
    client: reqwest::Client,
    config: JudgeConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl HttpJudgeClient {
    pub fn new(config: JudgeConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| JudgeError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        if config.api_key.is_none() {
            warn!("judge.api_key.missing");
        }
        Ok(Self {
            client,
            config,
            metrics,
        })
    }

    async fn send(&self, prompt: &str) -> Result<String, JudgeError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| JudgeError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| JudgeError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(JudgeError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl JudgeClient for HttpJudgeClient {
    async fn invoke(&self, prompt: &str, node_id: &str) -> Result<JudgeResult, JudgeError> {
        let started = Instant::now();
        let result = self.send(prompt).await;
        self.metrics.put_latency(
            &metric::invoke_latency(node_id),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        let raw_response = result?;

        let decision = parse_decision(&raw_response);
        if decision.is_none() {
            warn!(node_id, "judge.response.unparseable");
        } else {
            debug!(node_id, "judge.response.parsed");
        }
        Ok(JudgeResult {
            decision,
            prompt: prompt.to_string(),
            raw_response,
        })
    }
}

/// Extract the decision from a raw endpoint response.
///
/// Accepts the decision object itself or a messages-API envelope whose first
/// text block holds it, optionally wrapped in a Markdown code fence.
pub fn parse_decision(raw: &str) -> Option<Decision> {
    if let Ok(decision) = serde_json::from_str::<Decision>(raw) {
        return Some(decision);
    }
    let envelope: MessagesResponse = serde_json::from_str(raw).ok()?;
    let text = envelope
        .content
        .iter()
        .find(|block| block.kind == "text")
        .map(|block| block.text.as_str())?;
    serde_json::from_str(strip_code_fence(text)).ok()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. "json") up to the first newline
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(text: &str) -> String {
        serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "content": [{"type": "text", "text": text}],
        })
        .to_string()
    }

    #[test]
    fn test_parse_bare_decision() {
        let d = parse_decision(r#"{"should_intervene":true,"reason":"r","message":"m"}"#).unwrap();
        assert!(d.should_intervene);
        assert_eq!(d.message, "m");
    }

    #[test]
    fn test_parse_envelope_with_fence() {
        let raw = envelope("```json\n{\"should_intervene\":false,\"reason\":\"quiet\",\"message\":\"\"}\n```");
        let d = parse_decision(&raw).unwrap();
        assert!(!d.should_intervene);
        assert_eq!(d.reason, "quiet");
    }

    #[test]
    fn test_parse_envelope_plain_text_json() {
        let raw = envelope(" {\"should_intervene\":true,\"message\":\"hi\"} ");
        let d = parse_decision(&raw).unwrap();
        assert_eq!(d.message, "hi");
        assert_eq!(d.reason, "");
    }

    #[test]
    fn test_unparseable_answer_is_none() {
        assert!(parse_decision(&envelope("I think you should talk more.")).is_none());
        assert!(parse_decision("<html>").is_none());
        assert!(parse_decision(r#"{"content":[]}"#).is_none());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let config = JudgeConfig {
            endpoint: "http://127.0.0.1:9/v1/messages".into(),
            timeout_secs: 2,
            ..JudgeConfig::default()
        };
        let metrics = Arc::new(crate::adapters::MetricsRegistry::new());
        let client = HttpJudgeClient::new(config, metrics.clone()).unwrap();

        let err = client.invoke("prompt", "node").await.unwrap_err();
        assert!(matches!(err, JudgeError::Transport(_)));
        assert_eq!(metrics.snapshot().latencies["LLM.node.InvokeLatency"].count, 1);
    }
}
