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

//! Narrows catalog search results to the datasets that answer the question.

use crate::error::{AttemptError, PipelineError, Stage};
use crate::json;
use crate::model::Dataset;
use crate::prompts;
use crate::retry::{self, RetryPolicy};
use crate::trace::ExecutionTrace;
use indexmap::{IndexMap, IndexSet};
use llm_contracts::{LLMRequest, LLMResponse, LanguageModel, OutputSchema};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct SelectionReply {
    #[serde(default)]
    dataset_key: Vec<String>,
    #[serde(default)]
    dataset_name: Vec<String>,
}

pub fn selection_schema() -> OutputSchema {
    OutputSchema::new(
        "dataset_selection",
        json!({
            "type": "object",
            "required": ["dataset_key", "dataset_name"],
            "properties": {
                "dataset_key": {"type": "array", "items": {"type": "string"}},
                "dataset_name": {"type": "array", "items": {"type": "string"}}
            }
        }),
    )
}

#[instrument(skip_all, fields(candidates = candidates.len()))]
pub async fn discover(
    model: &dyn LanguageModel,
    question: &str,
    candidates: &IndexMap<String, Dataset>,
    policy: &RetryPolicy,
    trace: &mut ExecutionTrace,
) -> Result<Vec<Dataset>, PipelineError> {
    let request = LLMRequest::new(prompts::discovery_prompt(question, candidates))
        .with_output_schema(selection_schema());

    let selected = retry::run(
        Stage::Discovery,
        policy,
        trace,
        || model.invoke(request.clone()),
        |response| select(&response, candidates),
    )
    .await?;

    info!(
        selected = selected.len(),
        "datasets retained for planning"
    );
    Ok(selected)
}

fn select(
    response: &LLMResponse,
    candidates: &IndexMap<String, Dataset>,
) -> Result<Vec<Dataset>, AttemptError> {
    let reply: SelectionReply = json::decode(json::structured_payload(response)?)?;

    let mut keys = IndexSet::new();
    for key in &reply.dataset_key {
        if !candidates.contains_key(key) {
            return Err(AttemptError::UnknownDataset(key.clone()));
        }
        keys.insert(key.as_str());
    }
    if keys.is_empty() {
        return Err(AttemptError::Empty("no dataset keys were returned".into()));
    }

    for (key, name) in reply.dataset_key.iter().zip(&reply.dataset_name) {
        if candidates[key.as_str()].name != *name {
            debug!(%key, %name, "dataset name does not match the selected key");
        }
    }

    Ok(keys
        .into_iter()
        .map(|key| candidates[key].clone())
        .collect())
}
