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

//! Question-to-chart pipeline.
//!
//! A question is matched against catalog datasets, a chart is planned for each
//! relevant dataset, filter values are chosen, and the resulting queries are
//! executed. Every model-driven step is retried a bounded number of times and
//! checked against the column-role rules in [`validation`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod interpret;
pub mod json;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod stages;
pub mod state;
pub mod trace;
pub mod validation;

pub use catalog::{Catalog, CatalogError};
pub use config::{ConfigError, Paging, PipelineConfig};
pub use error::{AttemptError, PipelineError, PipelineResult, Stage};
pub use interpret::interpret;
pub use model::{
    AdminLevel, Calculation, ChartSpec, Column, ColumnType, Dataset, FilterField, Granularity,
    Operator, TemporalFormat, XField, YField,
};
pub use pipeline::{run_pipeline, Pipeline, PipelineRun};
pub use retry::RetryPolicy;
pub use trace::ExecutionTrace;
