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

use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone)]
pub struct TraceMark {
    pub label: String,
    pub at: Instant,
}

/// Elapsed time between two consecutive marks, named after the later one.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTiming {
    pub label: String,
    pub elapsed: Duration,
}

/// Monotonic timestamps taken around every catalog and model call of one run.
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    marks: Vec<TraceMark>,
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self { marks: Vec::new() }
    }

    pub fn mark(&mut self, label: impl Into<String>) {
        self.marks.push(TraceMark {
            label: label.into(),
            at: Instant::now(),
        });
    }

    pub fn marks(&self) -> &[TraceMark] {
        &self.marks
    }

    pub fn steps(&self) -> Vec<StepTiming> {
        self.marks
            .windows(2)
            .map(|pair| StepTiming {
                label: pair[1].label.clone(),
                elapsed: pair[1].at.duration_since(pair[0].at),
            })
            .collect()
    }

    pub fn total(&self) -> Duration {
        match (self.marks.first(), self.marks.last()) {
            (Some(first), Some(last)) => last.at.duration_since(first.at),
            _ => Duration::ZERO,
        }
    }

    pub fn log_summary(&self) {
        for (index, step) in self.steps().iter().enumerate() {
            info!(
                step = index + 1,
                label = %step.label,
                seconds = step.elapsed.as_secs_f64(),
                "step timing"
            );
        }
        info!(total_seconds = self.total().as_secs_f64(), "run complete");
    }
}

impl fmt::Display for ExecutionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps().iter().enumerate() {
            writeln!(
                f,
                "{:>3}. {:<32} {:>8.3}s",
                index + 1,
                step.label,
                step.elapsed.as_secs_f64()
            )?;
        }
        write!(f, "     {:<32} {:>8.3}s", "total", self.total().as_secs_f64())
    }
}
