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

#![allow(dead_code)]

use async_trait::async_trait;
use chartwise::{Catalog, CatalogError, ChartSpec, Column, ColumnType, Dataset};
use indexmap::IndexMap;
use llm_contracts::{LLMError, LLMRequest, LLMResponse, LLMResult, LanguageModel};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

pub enum Scripted {
    /// A JSON reply. Checked against the request's schema when one is set.
    Json(Value),
    Text(String),
    Fail,
}

/// Replays a fixed list of replies and records every request it receives.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedModel {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, request: LLMRequest) -> LLMResult<LLMResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();

        match next {
            Some(Scripted::Json(value)) => {
                let mut response = LLMResponse::text(request.id, "scripted", value.to_string());
                if let Some(schema) = &request.output_schema {
                    schema.check(&value)?;
                    response.structured = Some(value);
                }
                Ok(response)
            }
            Some(Scripted::Text(text)) => Ok(LLMResponse::text(request.id, "scripted", text)),
            Some(Scripted::Fail) => Err(LLMError::Network("connection reset".into())),
            None => Err(LLMError::Internal("script exhausted".into())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// In-memory catalog with fixed search results, metadata and filter options.
pub struct FakeCatalog {
    pub candidates: IndexMap<String, Dataset>,
    pub metadata: IndexMap<String, Dataset>,
    /// Options per column id.
    pub options: IndexMap<String, Vec<String>>,
    pub executed: Mutex<Vec<ChartSpec>>,
    pub fail_search: bool,
}

impl FakeCatalog {
    pub fn new(datasets: Vec<Dataset>) -> Self {
        let candidates = datasets
            .iter()
            .map(|d| {
                let mut bare = d.clone();
                bare.columns = None;
                (d.id.clone(), bare)
            })
            .collect();
        let metadata = datasets.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self {
            candidates,
            metadata,
            options: IndexMap::new(),
            executed: Mutex::new(Vec::new()),
            fail_search: false,
        }
    }

    pub fn with_options(mut self, column_id: &str, values: &[&str]) -> Self {
        self.options.insert(
            column_id.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn search(&self, _question: &str) -> Result<IndexMap<String, Dataset>, CatalogError> {
        if self.fail_search {
            return Err(CatalogError::Unauthorized);
        }
        Ok(self.candidates.clone())
    }

    async fn column_metadata(
        &self,
        datasets: &[Dataset],
    ) -> Result<IndexMap<String, Dataset>, CatalogError> {
        Ok(datasets
            .iter()
            .filter_map(|d| self.metadata.get(&d.id).cloned())
            .map(|d| (d.id.clone(), d))
            .collect())
    }

    async fn filter_options(&self, chart: &mut ChartSpec) -> Result<(), CatalogError> {
        for field in &mut chart.filter {
            field.value = self
                .options
                .get(&field.column.column_id)
                .cloned()
                .unwrap_or_default();
            field.operator = None;
        }
        Ok(())
    }

    async fn execute(&self, chart: &mut ChartSpec) -> Result<(), CatalogError> {
        chart.data = Some(json!({"rows": [[chart.id.clone(), 1]]}));
        self.executed.lock().unwrap().push(chart.clone());
        Ok(())
    }
}

/// `{Year: date, Region: nominal, GDP: float}`
pub fn gdp_malaysia() -> Dataset {
    let mut dataset = Dataset::new("A", "GDP Malaysia").with_columns([
        Column::new("Year", "Year", ColumnType::Date),
        Column::new("Region", "Region", ColumnType::Nominal),
        Column::new("GDP", "GDP", ColumnType::Float),
    ]);
    dataset.source_url = "https://catalog.example".to_string();
    dataset
}

pub fn weather_japan() -> Dataset {
    Dataset::new("B", "Weather Japan").with_columns([
        Column::new("Date", "Date", ColumnType::Datetime),
        Column::new("Prefecture", "Prefecture", ColumnType::Space),
        Column::new("Rainfall", "Rainfall", ColumnType::Float),
    ])
}

pub fn candidates(datasets: &[Dataset]) -> IndexMap<String, Dataset> {
    datasets.iter().map(|d| (d.id.clone(), d.clone())).collect()
}

/// Wraps a plan in the free-text form the planning prompt asks for.
pub fn plan_reply(plan: Value) -> Scripted {
    Scripted::Text(format!(
        "Phase 1: the question asks for GDP.\n```json\n{}\n```",
        serde_json::to_string_pretty(&plan).unwrap()
    ))
}

pub fn gdp_plan() -> Value {
    json!({
        "charts": [{
            "id": "A",
            "name": "GDP Malaysia",
            "x": [{"columnID": "Year", "type": "date", "format": "year"}],
            "y": [{"columnID": "GDP", "type": "float", "calculation": "sum"}],
            "filter": [
                {"columnID": "Year", "type": "date", "format": "year", "operator": "in", "value": ["2019"]},
                {"columnID": "Region", "type": "nominal", "format": "", "operator": "in", "value": []}
            ]
        }]
    })
}

pub fn gdp_refinement() -> Value {
    json!({
        "querys": [{
            "id": "A",
            "name": "GDP Malaysia",
            "filter": [
                {"columnID": "Year", "operator": "in", "value": ["2019"]},
                {"columnID": "Region", "operator": "in", "value": ["Selangor"]}
            ]
        }]
    })
}
