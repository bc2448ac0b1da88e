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

//! The data catalog as seen by the pipeline.

use crate::model::{ChartSpec, Dataset};
use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog login failed: {0}")]
    Login(String),

    #[error("catalog rejected the request after logging in again")]
    Unauthorized,

    #[error("catalog request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected catalog response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Keyword search. Keyed by dataset id; order carries no meaning.
    async fn search(&self, question: &str) -> Result<IndexMap<String, Dataset>, CatalogError>;

    /// Attaches columns to each dataset. Datasets without retrievable
    /// metadata are left out of the result.
    async fn column_metadata(
        &self,
        datasets: &[Dataset],
    ) -> Result<IndexMap<String, Dataset>, CatalogError>;

    /// Replaces each filter's `value` with the catalog's candidate options
    /// and clears its operator.
    async fn filter_options(&self, chart: &mut ChartSpec) -> Result<(), CatalogError>;

    /// Runs the chart query and stores the result in `chart.data`.
    async fn execute(&self, chart: &mut ChartSpec) -> Result<(), CatalogError>;
}
