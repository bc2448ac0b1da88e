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

use crate::schema::OutputSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A single-turn, stateless model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub id: Uuid,
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// When set the provider must return a JSON object conforming to it.
    pub output_schema: Option<OutputSchema>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Option<Vec<String>>,
    pub output_schema: Option<OutputSchema>,
    #[serde(flatten)]
    pub provider_specific: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl LLMRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            system_prompt: None,
            output_schema: None,
            generation_config: GenerationConfig::default(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = config;
        self
    }

    pub fn is_structured(&self) -> bool {
        self.output_schema.is_some()
    }
}

impl ProviderRequest {
    /// Lowers a request into the chat-message shape every provider speaks.
    /// Settings given per request win over the provider defaults.
    pub fn from_request(model: &str, request: &LLMRequest, defaults: &GenerationConfig) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(Message {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let config = &request.generation_config;
        Self {
            model: model.to_string(),
            messages,
            max_tokens: config.max_tokens.or(defaults.max_tokens),
            temperature: config.temperature.or(defaults.temperature),
            top_p: config.top_p.or(defaults.top_p),
            stop_sequences: config
                .stop_sequences
                .clone()
                .or_else(|| defaults.stop_sequences.clone()),
            output_schema: request.output_schema.clone(),
            provider_specific: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_request_puts_system_prompt_first() {
        let request = LLMRequest::new("question").with_system_prompt("be terse");
        let lowered = ProviderRequest::from_request("m", &request, &GenerationConfig::default());

        assert_eq!(lowered.messages.len(), 2);
        assert_eq!(lowered.messages[0].role, "system");
        assert_eq!(lowered.messages[1].content, "question");
        assert_eq!(lowered.temperature, None);
    }

    #[test]
    fn request_settings_override_defaults() {
        let mut request = LLMRequest::new("q");
        request.generation_config.max_tokens = Some(64);
        let defaults = GenerationConfig {
            max_tokens: Some(4096),
            temperature: Some(0.3),
            top_p: None,
            stop_sequences: None,
        };

        let lowered = ProviderRequest::from_request("m", &request, &defaults);
        assert_eq!(lowered.max_tokens, Some(64));
        assert_eq!(lowered.temperature, Some(0.3));
    }

    #[test]
    fn schema_travels_with_the_request() {
        let schema = OutputSchema::new("keys", json!({"type": "object"}));
        let request = LLMRequest::new("q").with_output_schema(schema);
        assert!(request.is_structured());

        let lowered = ProviderRequest::from_request("m", &request, &GenerationConfig::default());
        assert_eq!(lowered.output_schema.map(|s| s.name), Some("keys".to_string()));
    }
}
