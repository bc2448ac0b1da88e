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

//! Turns enriched datasets into one chart skeleton per relevant dataset.
//!
//! The model answers in free text ending with a JSON block. The block is read
//! into loosely-typed proposals first; only then are the column-role rules
//! applied, building each field from catalog metadata rather than from the
//! model's copy of it.

use crate::error::{AttemptError, PipelineError, Stage};
use crate::json::{self, token};
use crate::model::{ChartSpec, Column, Dataset, FilterField, Operator, XField};
use crate::prompts;
use crate::retry::{self, RetryPolicy};
use crate::trace::ExecutionTrace;
use crate::validation;
use indexmap::IndexMap;
use llm_contracts::{LLMRequest, LLMResponse, LanguageModel};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct PlanReply {
    #[serde(default)]
    charts: Vec<ChartProposal>,
}

#[derive(Debug, Deserialize)]
struct ChartProposal {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    x: Vec<FieldProposal>,
    #[serde(default)]
    y: Vec<FieldProposal>,
    #[serde(default)]
    filter: Vec<FieldProposal>,
}

#[derive(Debug, Deserialize)]
struct FieldProposal {
    #[serde(default, rename = "columnID")]
    column_id: Option<String>,
    #[serde(default)]
    format: Option<Value>,
    #[serde(default)]
    calculation: Option<Value>,
    #[serde(default)]
    operator: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
}

#[instrument(skip_all, fields(datasets = datasets.len()))]
pub async fn plan(
    model: &dyn LanguageModel,
    question: &str,
    datasets: &[Dataset],
    policy: &RetryPolicy,
    trace: &mut ExecutionTrace,
) -> Result<Vec<ChartSpec>, PipelineError> {
    let request = LLMRequest::new(prompts::planning_prompt(question, datasets))
        .with_system_prompt(prompts::ANALYST_SYSTEM_PROMPT);
    let by_id: IndexMap<&str, &Dataset> = datasets.iter().map(|d| (d.id.as_str(), d)).collect();

    let charts = retry::run(
        Stage::Planning,
        policy,
        trace,
        || model.invoke(request.clone()),
        |response| build_charts(&response, &by_id),
    )
    .await?;

    info!(charts = charts.len(), "chart plan accepted");
    Ok(charts)
}

fn build_charts(
    response: &LLMResponse,
    datasets: &IndexMap<&str, &Dataset>,
) -> Result<Vec<ChartSpec>, AttemptError> {
    let reply: PlanReply = json::decode(json::parse_text_reply(&response.content)?)?;

    let mut seen = HashSet::new();
    let mut charts = Vec::with_capacity(reply.charts.len());

    for proposal in &reply.charts {
        let id = proposal
            .id
            .as_deref()
            .ok_or_else(|| AttemptError::Shape("chart proposal without an id".into()))?;
        let dataset = datasets
            .get(id)
            .ok_or_else(|| AttemptError::UnknownDataset(id.to_string()))?;
        if !seen.insert(id) {
            return Err(AttemptError::DuplicateChart(id.to_string()));
        }
        charts.push(build_chart(dataset, proposal)?);
    }

    if charts.is_empty() {
        return Err(AttemptError::Empty("no chart was proposed".into()));
    }
    Ok(charts)
}

fn build_chart(dataset: &Dataset, proposal: &ChartProposal) -> Result<ChartSpec, AttemptError> {
    let mut chart = ChartSpec::for_dataset(dataset);

    for field in &proposal.x {
        let column = lookup(dataset, field)?;
        chart.x.push(XField {
            format: validation::resolve_format(column, token(field.format.as_ref()))?,
            column: column.clone(),
        });
    }

    for field in &proposal.y {
        let column = lookup(dataset, field)?;
        match validation::accept_measure(column, token(field.calculation.as_ref())) {
            Some(measure) => chart.y.push(measure),
            None => debug!(
                dataset = %dataset.id,
                column = %column.column_id,
                calculation = ?field.calculation,
                "dropping measure"
            ),
        }
    }

    for field in &proposal.filter {
        let column = lookup(dataset, field)?;
        chart.filter.push(FilterField {
            format: validation::resolve_format(column, token(field.format.as_ref()))?,
            operator: token(field.operator.as_ref()).and_then(Operator::parse),
            // Placeholder only; replaced by catalog filter options before refinement.
            value: validation::coerce_values(&column.column_id, field.value.as_ref())
                .unwrap_or_default(),
            column: column.clone(),
        });
    }

    Ok(chart)
}

fn lookup<'a>(dataset: &'a Dataset, field: &FieldProposal) -> Result<&'a Column, AttemptError> {
    let column_id = field
        .column_id
        .as_deref()
        .ok_or_else(|| AttemptError::Shape(format!("field without columnID in chart '{}'", dataset.id)))?;
    dataset
        .column(column_id)
        .ok_or_else(|| AttemptError::UnknownColumn {
            dataset: dataset.id.clone(),
            column: column_id.to_string(),
        })
}
