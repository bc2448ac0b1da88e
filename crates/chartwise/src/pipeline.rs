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

//! Discovery, planning, refinement and execution, in that order.

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{ChartSpec, Dataset};
use crate::retry::RetryPolicy;
use crate::stages;
use crate::state::{
    DiscoveredState, ExecutedCharts, ExecutedState, PipelineState, PlannedCharts, PlannedState,
    RefinedCharts, RefinedState,
};
use crate::trace::ExecutionTrace;
use llm_contracts::LanguageModel;
use tracing::{info, instrument};

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub charts: Vec<ChartSpec>,
    pub trace: ExecutionTrace,
}

pub struct Pipeline<'a> {
    model: &'a dyn LanguageModel,
    catalog: &'a dyn Catalog,
    policy: RetryPolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(model: &'a dyn LanguageModel, catalog: &'a dyn Catalog) -> Self {
        Self {
            model,
            catalog,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.policy = config.retry_policy();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[instrument(skip(self), fields(model = self.model.model_name()))]
    pub async fn run(&self, question: &str) -> PipelineResult<PipelineRun> {
        let mut trace = ExecutionTrace::new();
        let state = PipelineState::new(question);

        let state = self.discover(state, &mut trace).await?;
        let state = self.plan(state, &mut trace).await?;
        let state = self.refine(state, &mut trace).await?;
        let state = self.execute(state, &mut trace).await?;

        trace.log_summary();
        let ExecutedCharts(charts) = state.into_payload();
        Ok(PipelineRun { charts, trace })
    }

    /// Search and discovery only.
    pub async fn discover_datasets(
        &self,
        question: &str,
    ) -> PipelineResult<(Vec<Dataset>, ExecutionTrace)> {
        let mut trace = ExecutionTrace::new();
        let state = self.discover(PipelineState::new(question), &mut trace).await?;
        Ok((state.into_payload(), trace))
    }

    async fn discover(
        &self,
        state: PipelineState<()>,
        trace: &mut ExecutionTrace,
    ) -> PipelineResult<DiscoveredState> {
        trace.mark("search request");
        let candidates = self.catalog.search(state.question()).await?;
        trace.mark("search reply");
        info!(candidates = candidates.len(), "catalog search complete");

        let datasets = stages::discover(
            self.model,
            state.question(),
            &candidates,
            &self.policy,
            trace,
        )
        .await?;
        Ok(state.advance(datasets))
    }

    async fn plan(
        &self,
        state: DiscoveredState,
        trace: &mut ExecutionTrace,
    ) -> PipelineResult<PlannedState> {
        trace.mark("column metadata request");
        let enriched = self.catalog.column_metadata(state.payload()).await?;
        trace.mark("column metadata reply");
        if enriched.is_empty() {
            return Err(PipelineError::NoMetadata);
        }

        let datasets: Vec<Dataset> = enriched.into_values().collect();
        let charts =
            stages::plan(self.model, state.question(), &datasets, &self.policy, trace).await?;
        Ok(state.advance(PlannedCharts(charts)))
    }

    async fn refine(
        &self,
        state: PlannedState,
        trace: &mut ExecutionTrace,
    ) -> PipelineResult<RefinedState> {
        let (state, PlannedCharts(mut charts)) = state.split();

        trace.mark("filter options request");
        for chart in &mut charts {
            self.catalog.filter_options(chart).await?;
        }
        trace.mark("filter options reply");

        let refined =
            stages::refine(self.model, state.question(), &charts, &self.policy, trace).await?;
        Ok(state.advance(RefinedCharts(refined)))
    }

    async fn execute(
        &self,
        state: RefinedState,
        trace: &mut ExecutionTrace,
    ) -> PipelineResult<ExecutedState> {
        let (state, RefinedCharts(mut charts)) = state.split();

        trace.mark("execute request");
        for chart in &mut charts {
            self.catalog.execute(chart).await?;
        }
        trace.mark("execute reply");

        Ok(state.advance(ExecutedCharts(charts)))
    }
}

/// Runs the whole pipeline with default settings.
pub async fn run_pipeline(
    question: &str,
    model: &dyn LanguageModel,
    catalog: &dyn Catalog,
) -> PipelineResult<Vec<ChartSpec>> {
    Pipeline::new(model, catalog)
        .run(question)
        .await
        .map(|run| run.charts)
}
