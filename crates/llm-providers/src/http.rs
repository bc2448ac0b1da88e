// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use llm_contracts::{LLMError, LLMResult, ModelSettings};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TransportPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Base delay; doubled per retry, capped at eight times the base.
    pub backoff: Duration,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl TransportPolicy {
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_seconds),
            max_retries: settings.max_retries,
            ..Self::default()
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * 2_u32.pow(attempt.min(3))
    }
}

pub(crate) fn build_client(policy: &TransportPolicy) -> LLMResult<Client> {
    Client::builder()
        .timeout(policy.timeout)
        .build()
        .map_err(|e| LLMError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// POSTs `payload` and returns the decoded JSON body.
///
/// Network errors, timeouts, 429 and 5xx are retried; authentication and
/// other client errors end the loop immediately.
pub(crate) async fn post_json_with_retry(
    client: &Client,
    endpoint: &str,
    headers: &[(&str, String)],
    payload: &Value,
    policy: &TransportPolicy,
    provider: &str,
) -> LLMResult<Value> {
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        debug!(
            attempt = attempt + 1,
            max_attempts = policy.max_retries + 1,
            "Sending request to {provider} API"
        );

        let mut builder = client.post(endpoint).json(payload);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        match tokio::time::timeout(policy.timeout, builder.send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<Value>().await.map_err(|e| {
                        LLMError::Serialisation(format!("Failed to parse {provider} response: {e}"))
                    });
                }

                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());

                match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        return Err(LLMError::Authentication(format!(
                            "{provider} API rejected credentials ({status}): {body}"
                        )));
                    }
                    StatusCode::TOO_MANY_REQUESTS => {
                        warn!("Rate limited by {provider} API");
                        last_error = Some(LLMError::RateLimit);
                    }
                    s if s.is_server_error() => {
                        last_error = Some(LLMError::Provider(format!(
                            "{provider} API error {status}: {body}"
                        )));
                    }
                    _ => {
                        return Err(LLMError::Provider(format!(
                            "{provider} API error {status}: {body}"
                        )));
                    }
                }
            }
            Ok(Err(e)) => {
                last_error = Some(LLMError::Network(format!("Request failed: {e}")));
            }
            Err(_) => {
                warn!(
                    "Request to {provider} API timed out after {} seconds",
                    policy.timeout.as_secs()
                );
                last_error = Some(LLMError::Timeout);
            }
        }

        if attempt < policy.max_retries {
            tokio::time::sleep(policy.delay(attempt)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| LLMError::Internal("Unknown error".to_string())))
}

pub(crate) fn token_count(value: &Value, key: &str) -> u32 {
    value[key]
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}
