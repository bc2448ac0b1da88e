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

use crate::catalog::CatalogError;
use crate::model::{ColumnType, Operator};
use llm_contracts::LLMError;
use std::fmt;
use thiserror::Error;

/// The model-driven stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Discovery,
    Planning,
    Refinement,
}

impl Stage {
    pub fn fatal_message(&self) -> &'static str {
        match self {
            Stage::Discovery => "no dataset that could answer the question was found",
            Stage::Planning => "model cannot produce an accurate analysis specification",
            Stage::Refinement => "model cannot select accurate filter values",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discovery => f.write_str("discovery"),
            Stage::Planning => f.write_str("planning"),
            Stage::Refinement => f.write_str("refinement"),
        }
    }
}

/// Why a single model attempt was rejected. Always retried within the stage.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("model call failed: {0}")]
    Model(#[from] LLMError),

    #[error("reply is not valid JSON: {0}")]
    Parse(String),

    #[error("reply does not have the expected shape: {0}")]
    Shape(String),

    #[error("reply selected nothing: {0}")]
    Empty(String),

    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("dataset '{0}' was given more than one chart")]
    DuplicateChart(String),

    #[error("column '{column}' does not exist in dataset '{dataset}'")]
    UnknownColumn { dataset: String, column: String },

    #[error("format {value:?} is not valid for {column_type} column '{column}'")]
    InvalidFormat {
        column: String,
        column_type: ColumnType,
        value: Option<String>,
    },

    #[error("operator '{operator}' is not allowed for {column_type} column '{column}'")]
    InvalidOperator {
        column: String,
        column_type: ColumnType,
        operator: String,
    },

    #[error("filter list of chart '{chart}' changed from {expected:?} to {actual:?}")]
    FilterMismatch {
        chart: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("invalid value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },
}

impl AttemptError {
    pub(crate) fn invalid_operator(column: &str, column_type: ColumnType, op: Operator) -> Self {
        AttemptError::InvalidOperator {
            column: column.to_string(),
            column_type,
            operator: op.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{}", .stage.fatal_message())]
    StageExhausted {
        stage: Stage,
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("no column metadata could be retrieved for the selected datasets")]
    NoMetadata,

    #[error("catalog request failed: {0}")]
    Catalog(#[from] CatalogError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
