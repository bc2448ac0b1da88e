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

use async_trait::async_trait;
use llm_contracts::{LLMError, LLMResult, ProviderRequest, ProviderResponse, Usage};
use reqwest::Client;
use serde_json::{json, Value};

use super::http::{build_client, post_json_with_retry, token_count, TransportPolicy};
use super::ApiClient;

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const GEMINI_COMPAT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
pub const OLLAMA_COMPAT_ENDPOINT: &str = "http://localhost:11434/v1/chat/completions";

/// Chat-completions client. Also serves any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    endpoint: String,
    policy: TransportPolicy,
}

impl OpenAIClient {
    pub fn new(
        api_key: String,
        endpoint: Option<String>,
        policy: TransportPolicy,
    ) -> LLMResult<Self> {
        Ok(Self {
            client: build_client(&policy)?,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| OPENAI_ENDPOINT.to_string()),
            policy,
        })
    }

    fn build_openai_payload(&self, request: &ProviderRequest) -> Value {
        let mut payload = json!({
            "model": request.model,
            "messages": request.messages.iter().map(|msg| {
                json!({
                    "role": msg.role,
                    "content": msg.content
                })
            }).collect::<Vec<_>>()
        });

        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            payload["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop_sequences {
            payload["stop"] = json!(stop);
        }
        if let Some(schema) = &request.output_schema {
            payload["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                }
            });
        }

        for (key, value) in &request.provider_specific {
            payload[key] = value.clone();
        }

        payload
    }

    fn parse_openai_response(
        &self,
        response_data: Value,
        model: String,
    ) -> LLMResult<ProviderResponse> {
        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                LLMError::Provider("Failed to extract content from OpenAI response".to_string())
            })?;

        let usage = response_data
            .get("usage")
            .map(|usage_data| Usage {
                prompt_tokens: token_count(usage_data, "prompt_tokens"),
                completion_tokens: token_count(usage_data, "completion_tokens"),
                total_tokens: token_count(usage_data, "total_tokens"),
            })
            .unwrap_or_default();

        let finish_reason = response_data["choices"][0]["finish_reason"]
            .as_str()
            .map(|s| s.to_string());

        Ok(ProviderResponse {
            content: content.to_string(),
            model,
            usage,
            finish_reason,
            raw_response: response_data,
        })
    }
}

#[async_trait]
impl ApiClient for OpenAIClient {
    async fn send_request(&self, request: ProviderRequest) -> LLMResult<ProviderResponse> {
        let payload = self.build_openai_payload(&request);
        let mut headers = vec![("content-type", "application/json".to_string())];
        if !self.api_key.is_empty() {
            headers.push(("authorization", format!("Bearer {}", self.api_key)));
        }

        let response_data = post_json_with_retry(
            &self.client,
            &self.endpoint,
            &headers,
            &payload,
            &self.policy,
            self.provider_name(),
        )
        .await?;
        self.parse_openai_response(response_data, request.model)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_contracts::{GenerationConfig, LLMRequest, OutputSchema};

    fn client() -> OpenAIClient {
        OpenAIClient::new("k".into(), None, TransportPolicy::default()).unwrap()
    }

    #[test]
    fn structured_requests_set_response_format() {
        let request = LLMRequest::new("q").with_output_schema(OutputSchema::new(
            "selection",
            json!({"type": "object"}),
        ));
        let lowered = ProviderRequest::from_request("gpt-4o", &request, &GenerationConfig::default());
        let payload = client().build_openai_payload(&lowered);

        assert_eq!(payload["response_format"]["type"], "json_schema");
        assert_eq!(payload["response_format"]["json_schema"]["name"], "selection");
    }

    #[test]
    fn plain_requests_have_no_response_format() {
        let request = LLMRequest::new("q");
        let lowered = ProviderRequest::from_request("gpt-4o", &request, &GenerationConfig::default());
        let payload = client().build_openai_payload(&lowered);
        assert!(payload.get("response_format").is_none());
    }
}
