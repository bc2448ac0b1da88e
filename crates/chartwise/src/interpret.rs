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

use crate::model::ChartSpec;
use crate::prompts;
use llm_contracts::{LLMRequest, LLMResult, LanguageModel};
use tracing::debug;

/// Asks the model for a written answer grounded in the executed charts.
pub async fn interpret(
    model: &dyn LanguageModel,
    question: &str,
    charts: &[ChartSpec],
) -> LLMResult<String> {
    let request = LLMRequest::new(prompts::interpretation_prompt(question, charts))
        .with_system_prompt(prompts::ANALYST_SYSTEM_PROMPT);
    let response = model.invoke(request).await?;
    debug!(chars = response.content.len(), "interpretation received");
    Ok(response.content.trim().to_string())
}
