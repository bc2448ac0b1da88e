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

pub const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    endpoint: String,
    api_version: String,
    policy: TransportPolicy,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        endpoint: Option<String>,
        api_version: Option<String>,
        policy: TransportPolicy,
    ) -> LLMResult<Self> {
        Ok(Self {
            client: build_client(&policy)?,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| ANTHROPIC_ENDPOINT.to_string()),
            api_version: api_version.unwrap_or_else(|| "2023-06-01".to_string()),
            policy,
        })
    }

    fn build_anthropic_payload(&self, request: &ProviderRequest) -> Value {
        let mut system_content = Vec::new();
        let mut regular_messages = Vec::new();

        for msg in &request.messages {
            if msg.role == "system" {
                system_content.push(msg.content.clone());
            } else {
                regular_messages.push(json!({
                    "role": msg.role,
                    "content": msg.content
                }));
            }
        }

        // No native constrained decoding here; the schema goes into the system prompt
        // and the reply is checked afterwards.
        if let Some(schema) = &request.output_schema {
            system_content.push(format!(
                "Respond with a single JSON object and nothing else. It must conform to this JSON schema:\n{}",
                schema.schema
            ));
        }

        let mut payload = json!({
            "model": request.model,
            "messages": regular_messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });

        if !system_content.is_empty() {
            payload["system"] = json!(system_content.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            payload["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop_sequences {
            payload["stop_sequences"] = json!(stop);
        }

        for (key, value) in &request.provider_specific {
            payload[key] = value.clone();
        }

        payload
    }

    fn parse_anthropic_response(
        &self,
        response_data: Value,
        model: String,
    ) -> LLMResult<ProviderResponse> {
        let content = response_data["content"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                LLMError::Provider("Failed to extract content from Anthropic response".to_string())
            })?;

        let usage = response_data
            .get("usage")
            .map(|usage_data| {
                let input = token_count(usage_data, "input_tokens");
                let output = token_count(usage_data, "output_tokens");
                Usage {
                    prompt_tokens: input,
                    completion_tokens: output,
                    total_tokens: input + output,
                }
            })
            .unwrap_or_default();

        let finish_reason = response_data["stop_reason"].as_str().map(|s| s.to_string());

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
impl ApiClient for AnthropicClient {
    async fn send_request(&self, request: ProviderRequest) -> LLMResult<ProviderResponse> {
        let payload = self.build_anthropic_payload(&request);
        let headers = [
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", self.api_version.clone()),
            ("content-type", "application/json".to_string()),
        ];

        let response_data = post_json_with_retry(
            &self.client,
            &self.endpoint,
            &headers,
            &payload,
            &self.policy,
            self.provider_name(),
        )
        .await?;
        self.parse_anthropic_response(response_data, request.model)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_contracts::{GenerationConfig, LLMRequest, OutputSchema};

    #[test]
    fn system_prompt_and_schema_are_lifted_out_of_messages() {
        let client =
            AnthropicClient::new("k".into(), None, None, TransportPolicy::default()).unwrap();
        let request = LLMRequest::new("which datasets?")
            .with_system_prompt("You filter datasets.")
            .with_output_schema(OutputSchema::new("s", json!({"type": "object"})));
        let lowered = ProviderRequest::from_request("claude", &request, &GenerationConfig::default());

        let payload = client.build_anthropic_payload(&lowered);
        let system = payload["system"].as_str().unwrap();

        assert!(system.starts_with("You filter datasets."));
        assert!(system.contains("JSON schema"));
        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(payload["max_tokens"], 4096);
    }
}
