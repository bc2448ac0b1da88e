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

//! Chooses filter operators and values for planned charts.
//!
//! The model may rewrite only `operator` and `value`. Every other part of a
//! chart, including which filters exist and in what order, is taken from the
//! planned input.

use crate::error::{AttemptError, PipelineError, Stage};
use crate::json::{self, token};
use crate::model::ChartSpec;
use crate::prompts;
use crate::retry::{self, RetryPolicy};
use crate::trace::ExecutionTrace;
use crate::validation;
use llm_contracts::{LLMRequest, LLMResponse, LanguageModel, OutputSchema};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
struct RefineReply {
    #[serde(default)]
    querys: Vec<QueryProposal>,
}

#[derive(Debug, Deserialize)]
struct QueryProposal {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    filter: Vec<FilterProposal>,
}

#[derive(Debug, Deserialize)]
struct FilterProposal {
    #[serde(default, rename = "columnID")]
    column_id: Option<String>,
    #[serde(default)]
    operator: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
}

pub fn query_schema() -> OutputSchema {
    OutputSchema::new(
        "query_list",
        json!({
            "type": "object",
            "required": ["querys"],
            "properties": {
                "querys": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "filter"],
                        "properties": {
                            "id": {"type": "string"},
                            "name": {"type": "string"},
                            "sourceURL": {"type": "string"},
                            "x": {"type": "array"},
                            "y": {"type": "array"},
                            "filter": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "required": ["columnID"],
                                    "properties": {"columnID": {"type": "string"}}
                                }
                            }
                        }
                    }
                }
            }
        }),
    )
}

#[instrument(skip_all, fields(charts = charts.len()))]
pub async fn refine(
    model: &dyn LanguageModel,
    question: &str,
    charts: &[ChartSpec],
    policy: &RetryPolicy,
    trace: &mut ExecutionTrace,
) -> Result<Vec<ChartSpec>, PipelineError> {
    let request = LLMRequest::new(prompts::refinement_prompt(question, charts))
        .with_system_prompt(prompts::ANALYST_SYSTEM_PROMPT)
        .with_output_schema(query_schema());

    let refined = retry::run(
        Stage::Refinement,
        policy,
        trace,
        || model.invoke(request.clone()),
        |response| apply_reply(&response, charts),
    )
    .await?;

    info!(
        filters = refined.iter().map(|c| c.filter.len()).sum::<usize>(),
        "filter values selected"
    );
    Ok(refined)
}

fn apply_reply(
    response: &LLMResponse,
    charts: &[ChartSpec],
) -> Result<Vec<ChartSpec>, AttemptError> {
    let reply: RefineReply = json::decode(json::structured_payload(response)?)?;

    if reply.querys.len() != charts.len() {
        return Err(AttemptError::Shape(format!(
            "expected {} queries, got {}",
            charts.len(),
            reply.querys.len()
        )));
    }

    charts
        .iter()
        .zip(&reply.querys)
        .map(|(chart, query)| refine_chart(chart, query))
        .collect()
}

fn refine_chart(chart: &ChartSpec, query: &QueryProposal) -> Result<ChartSpec, AttemptError> {
    if query.id.as_deref() != Some(chart.id.as_str()) {
        return Err(AttemptError::Shape(format!(
            "expected query for chart '{}', got {:?}",
            chart.id, query.id
        )));
    }

    let proposed_ids: Vec<Option<String>> =
        query.filter.iter().map(|f| f.column_id.clone()).collect();
    validation::check_filter_shape(chart, &proposed_ids)?;

    let filter = chart
        .filter
        .iter()
        .zip(&query.filter)
        .map(|(planned, proposal)| {
            validation::refine_filter(
                planned,
                token(proposal.operator.as_ref()),
                proposal.value.as_ref(),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(validation::normalise_formats(ChartSpec {
        filter,
        ..chart.clone()
    }))
}
