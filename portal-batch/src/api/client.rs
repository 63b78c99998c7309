//! HTTP transport for inbound-webhook portals
//!
//! Every method is `POST {webhook}/{method}.json`. Batches go to the `batch`
//! method with each command rendered as `method?query`.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};

use super::constants::BATCH_METHOD;
use super::operations::{BatchResult, Command, CommandResult, Parameters};
use super::transport::{ApiResponse, BatchTransport};
use crate::config::Config;

pub struct HttpTransport {
    client: reqwest::Client,
    webhook_url: String,
}

impl HttpTransport {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.trim().is_empty() {
            bail!("Webhook URL must not be empty");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            webhook_url: webhook_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let webhook_url = config
            .portal
            .webhook_url
            .as_deref()
            .context("No webhook URL configured. Set portal.webhook_url or PORTAL_BATCH_WEBHOOK_URL")?;
        Self::new(
            webhook_url,
            Duration::from_secs(config.http.timeout_secs),
            &config.http.user_agent,
        )
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}.json", self.webhook_url, method)
    }

    async fn post(&self, method: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(method);
        debug!("POST {}", url);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", method))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response of {}", method))?;
        debug!(
            "{} answered {} in {:.2}ms",
            method,
            status,
            started.elapsed().as_secs_f64() * 1000.0
        );

        let parsed: Option<Value> = serde_json::from_str(&text).ok();
        if let Some(error) = parsed.as_ref().and_then(portal_error) {
            warn!("{} returned error: {}", method, error);
            bail!("{} ({})", error, status);
        }
        if !status.is_success() {
            warn!("{} returned HTTP {}", method, status);
            bail!("HTTP {} from {}: {}", status, method, text);
        }
        parsed.with_context(|| format!("Response of {} is not valid JSON", method))
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn call(&self, method: &str, parameters: &Parameters) -> Result<ApiResponse> {
        let body = self.post(method, &parameters.to_json()).await?;
        parse_api_response(&body)
    }

    async fn execute_batch(&self, commands: &[Command]) -> Result<BatchResult> {
        let cmd: Map<String, Value> = commands
            .iter()
            .map(|command| (command.id.clone(), Value::String(command.to_query_string())))
            .collect();
        let body = self
            .post(BATCH_METHOD, &json!({ "halt": 0, "cmd": cmd }))
            .await?;
        parse_batch_response(commands, &body)
    }
}

/// `{error, error_description}` of a failed call, as one message
fn portal_error(body: &Value) -> Option<String> {
    let code = body.get("error")?;
    let code = match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match body.get("error_description").and_then(Value::as_str) {
        Some(description) if !description.is_empty() => Some(format!("{}: {}", code, description)),
        _ => Some(code),
    }
}

pub fn parse_api_response(body: &Value) -> Result<ApiResponse> {
    let result = body
        .get("result")
        .cloned()
        .context("Response has no `result` field")?;
    Ok(ApiResponse {
        result,
        total: body.get("total").and_then(as_count),
        next: body.get("next").and_then(as_count),
    })
}

/// Split a batch response into per-command results in `commands` order.
///
/// Empty sections arrive as `[]` rather than `{}`; both are accepted.
pub fn parse_batch_response(commands: &[Command], body: &Value) -> Result<BatchResult> {
    let envelope = body
        .get("result")
        .context("Batch response has no `result` field")?;
    let results = section(envelope, "result");
    let errors = section(envelope, "result_error");
    let totals = section(envelope, "result_total");

    let mut out = Vec::with_capacity(commands.len());
    for command in commands {
        let id = command.id.as_str();
        if let Some(error) = errors.and_then(|e| e.get(id)) {
            let message = portal_error(error).unwrap_or_else(|| match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            out.push(CommandResult::error(id, message));
        } else if let Some(data) = results.and_then(|r| r.get(id)) {
            let total = totals.and_then(|t| t.get(id)).and_then(as_count);
            out.push(CommandResult::success(id, data.clone(), total));
        } else {
            out.push(CommandResult::error(id, "No result returned for command"));
        }
    }
    Ok(BatchResult::new(out))
}

fn section<'a>(envelope: &'a Value, name: &str) -> Option<&'a Map<String, Value>> {
    envelope.get(name).and_then(Value::as_object)
}

fn as_count(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
