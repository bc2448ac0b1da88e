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

use crate::{LLMRequest, LLMResponse, LLMResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Stateless single-turn access to a model.
///
/// For requests carrying an output schema, implementations must return
/// `LLMError::SchemaMismatch` rather than a non-conforming `structured` value.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, request: LLMRequest) -> LLMResult<LLMResponse>;

    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn invoke(&self, request: LLMRequest) -> LLMResult<LLMResponse> {
        (**self).invoke(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    async fn invoke(&self, request: LLMRequest) -> LLMResult<LLMResponse> {
        (**self).invoke(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
