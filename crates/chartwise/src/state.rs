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

//! Per-stage run state. Each stage consumes one state and hands back the next,
//! so a stage can only run once the one before it has produced its payload.

use crate::model::{ChartSpec, Dataset};

#[derive(Debug, Clone)]
pub struct PipelineState<P> {
    question: String,
    payload: P,
}

/// Charts as planned, filters still holding placeholder values.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCharts(pub Vec<ChartSpec>);

/// Charts whose filters carry the model's chosen operator and values.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedCharts(pub Vec<ChartSpec>);

/// Charts with their query result attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCharts(pub Vec<ChartSpec>);

impl PipelineState<()> {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            payload: (),
        }
    }
}

impl<P> PipelineState<P> {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Takes the payload out, leaving a bare state to advance later.
    pub fn split(self) -> (PipelineState<()>, P) {
        (PipelineState::new(self.question), self.payload)
    }

    pub fn advance<Q>(self, payload: Q) -> PipelineState<Q> {
        PipelineState {
            question: self.question,
            payload,
        }
    }
}

pub type DiscoveredState = PipelineState<Vec<Dataset>>;
pub type PlannedState = PipelineState<PlannedCharts>;
pub type RefinedState = PipelineState<RefinedCharts>;
pub type ExecutedState = PipelineState<ExecutedCharts>;
