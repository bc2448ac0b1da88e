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

//! Bounded generate-then-validate loop shared by the model-driven stages.

use crate::error::{AttemptError, PipelineError, Stage};
use crate::trace::ExecutionTrace;
use llm_contracts::{LLMResponse, LLMResult};
use std::future::Future;
use tracing::{info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Calls `generate` until `validate` accepts its output.
///
/// Every attempt is a fresh model call; nothing is carried over between
/// attempts. Rejected attempts are logged and dropped. When the budget is
/// spent the stage fails with [`PipelineError::StageExhausted`], carrying the
/// last rejection as its source.
pub async fn run<T, G, Fut, V>(
    stage: Stage,
    policy: &RetryPolicy,
    trace: &mut ExecutionTrace,
    mut generate: G,
    mut validate: V,
) -> Result<T, PipelineError>
where
    G: FnMut() -> Fut,
    Fut: Future<Output = LLMResult<LLMResponse>>,
    V: FnMut(LLMResponse) -> Result<T, AttemptError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        trace.mark(format!("{stage} request"));
        let reply = generate().await;
        trace.mark(format!("{stage} reply"));

        match reply.map_err(AttemptError::from).and_then(&mut validate) {
            Ok(artifact) => {
                if attempt > 1 {
                    info!(%stage, attempt, "stage succeeded after retry");
                }
                return Ok(artifact);
            }
            Err(e) => {
                warn!(%stage, attempt, max_attempts, error = %e, "attempt rejected");
                last_error = Some(e);
            }
        }
    }

    Err(PipelineError::StageExhausted {
        stage,
        attempts: max_attempts,
        last: last_error.unwrap_or_else(|| AttemptError::Empty("no attempt was made".into())),
    })
}
