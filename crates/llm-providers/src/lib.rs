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

//! HTTP clients that implement [`LanguageModel`] for hosted and local models.

pub mod anthropic;
pub mod http;
pub mod openai;

use async_trait::async_trait;
use llm_contracts::{
    GenerationConfig, LLMError, LLMRequest, LLMResponse, LLMResult, LanguageModel, ModelSettings,
    Provider, ProviderRequest, ProviderResponse,
};
use tracing::debug;

pub use anthropic::AnthropicClient;
pub use http::TransportPolicy;
pub use openai::OpenAIClient;

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send_request(&self, request: ProviderRequest) -> LLMResult<ProviderResponse>;

    fn provider_name(&self) -> &'static str;
}

/// Binds an [`ApiClient`] to one model name and its generation defaults.
pub struct ChatModel<C> {
    client: C,
    model: String,
    defaults: GenerationConfig,
}

impl<C: ApiClient> ChatModel<C> {
    pub fn new(client: C, model: impl Into<String>, defaults: GenerationConfig) -> Self {
        Self {
            client,
            model: model.into(),
            defaults,
        }
    }
}

#[async_trait]
impl<C: ApiClient> LanguageModel for ChatModel<C> {
    async fn invoke(&self, request: LLMRequest) -> LLMResult<LLMResponse> {
        let provider_request = ProviderRequest::from_request(&self.model, &request, &self.defaults);
        let response = self.client.send_request(provider_request).await?;
        debug!(
            provider = self.client.provider_name(),
            model = %self.model,
            completion_tokens = response.usage.completion_tokens,
            "model reply received"
        );

        let structured = match &request.output_schema {
            Some(schema) => Some(schema.parse_reply(&response.content)?),
            None => None,
        };

        Ok(LLMResponse::from_provider(
            request.id,
            self.client.provider_name(),
            response,
            structured,
        ))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Builds the configured model. `api_key` may be empty only for local
/// providers that do not authenticate.
pub fn build_model(
    settings: &ModelSettings,
    api_key: Option<String>,
) -> LLMResult<Box<dyn LanguageModel>> {
    let transport = TransportPolicy::from_settings(settings);
    let defaults = settings.generation_defaults();

    let model: Box<dyn LanguageModel> = match settings.provider() {
        Provider::Anthropic => {
            let key = require_key(api_key, "anthropic")?;
            let client = AnthropicClient::new(key, settings.endpoint.clone(), None, transport)?;
            Box::new(ChatModel::new(client, settings.model.clone(), defaults))
        }
        Provider::OpenAI => {
            let key = require_key(api_key, "openai")?;
            let client = OpenAIClient::new(key, settings.endpoint.clone(), transport)?;
            Box::new(ChatModel::new(client, settings.model.clone(), defaults))
        }
        Provider::Gemini => {
            let key = require_key(api_key, "gemini")?;
            let endpoint = settings
                .endpoint
                .clone()
                .unwrap_or_else(|| openai::GEMINI_COMPAT_ENDPOINT.to_string());
            let client = OpenAIClient::new(key, Some(endpoint), transport)?;
            Box::new(ChatModel::new(client, settings.model.clone(), defaults))
        }
        Provider::Ollama => {
            let endpoint = settings
                .endpoint
                .clone()
                .unwrap_or_else(|| openai::OLLAMA_COMPAT_ENDPOINT.to_string());
            let client = OpenAIClient::new(api_key.unwrap_or_default(), Some(endpoint), transport)?;
            Box::new(ChatModel::new(client, settings.model.clone(), defaults))
        }
        Provider::Custom(name) => {
            let endpoint = settings.endpoint.clone().ok_or_else(|| {
                LLMError::Configuration(format!(
                    "provider '{name}' needs an explicit OpenAI-compatible endpoint"
                ))
            })?;
            let client = OpenAIClient::new(api_key.unwrap_or_default(), Some(endpoint), transport)?;
            Box::new(ChatModel::new(client, settings.model.clone(), defaults))
        }
    };

    Ok(model)
}

fn require_key(api_key: Option<String>, provider: &str) -> LLMResult<String> {
    api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
        LLMError::Configuration(format!("no API key configured for provider '{provider}'"))
    })
}
