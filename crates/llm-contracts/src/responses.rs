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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub content: String,
    /// Parsed and schema-checked object, present only for structured requests.
    pub structured: Option<serde_json::Value>,
    pub model_used: String,
    pub provider_used: String,
    pub usage: Usage,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
    pub finish_reason: Option<String>,
    pub raw_response: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl LLMResponse {
    pub fn from_provider(
        request_id: Uuid,
        provider: &str,
        response: ProviderResponse,
        structured: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            content: response.content,
            structured,
            model_used: response.model,
            provider_used: provider.to_string(),
            usage: response.usage,
            created_at: Utc::now(),
        }
    }

    /// Plain-text reply, used by tests and in-process model doubles.
    pub fn text(request_id: Uuid, model: &str, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            content: content.into(),
            structured: None,
            model_used: model.to_string(),
            provider_used: "local".to_string(),
            usage: Usage::default(),
            created_at: Utc::now(),
        }
    }
}
