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

//! HTTP client for the dataset catalog.
//!
//! Every call carries a bearer token obtained from the login endpoint. A
//! request answered with 401 triggers one fresh login and one resend.

mod config;
mod wire;

pub use config::{CatalogConfig, Credentials};

use async_trait::async_trait;
use chartwise::{Catalog, CatalogError, ChartSpec, Column, Dataset, Paging};
use indexmap::IndexMap;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use wire::{RawColumn, RawDataset, RawMetadata};

pub struct CatalogClient {
    http: Client,
    config: CatalogConfig,
    credentials: Credentials,
    token: RwLock<Option<String>>,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig, credentials: Credentials) -> Result<Self, CatalogError> {
        if config.search_url.is_empty() || config.login_url.is_empty() {
            return Err(CatalogError::Configuration(
                "search_url and login_url must both be set".into(),
            ));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CatalogError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            credentials,
            token: RwLock::new(None),
        })
    }

    pub fn paging(&self) -> Paging {
        self.config.paging
    }

    /// Logs in and stores the new access token.
    pub async fn login(&self) -> Result<(), CatalogError> {
        debug!(url = %self.config.login_url, "Logging in to catalog");
        let response = self
            .http
            .post(&self.config.login_url)
            .json(&self.credentials)
            .send()
            .await
            .map_err(|e| CatalogError::Login(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Login(format!("status {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CatalogError::Login(format!("unreadable login response: {e}")))?;
        let token = body["data"]["accessToken"]
            .as_str()
            .ok_or_else(|| CatalogError::Login("login response has no access token".into()))?;

        *self.token.write().await = Some(token.to_string());
        info!("Catalog login succeeded");
        Ok(())
    }

    async fn current_token(&self) -> Result<String, CatalogError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| CatalogError::Login("no token after login".into()))
    }

    /// Sends one request and returns the unwrapped `data` payload.
    async fn call(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, CatalogError> {
        let mut relogged = false;

        loop {
            let token = self.current_token().await?;
            let mut builder = self
                .http
                .request(method.clone(), url)
                .bearer_auth(token)
                .query(query);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| CatalogError::Network(e.to_string()))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if relogged {
                    return Err(CatalogError::Unauthorized);
                }
                warn!(%url, "Catalog token rejected, logging in again");
                self.login().await?;
                relogged = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CatalogError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| CatalogError::Decode(format!("{url}: {e}")))?;
            return wire::unwrap_envelope(body);
        }
    }

    async fn dataset_columns(&self, dataset: &Dataset) -> Result<Vec<Column>, CatalogError> {
        let url = format!("{}/api/dataset/{}", dataset.source_url, dataset.id);
        let data = self.call(Method::GET, &url, &[], None).await?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        let metadata: RawMetadata = serde_json::from_value(data)
            .map_err(|e| CatalogError::Decode(format!("metadata for '{}': {e}", dataset.id)))?;

        let mut columns: Vec<Column> = metadata
            .columns
            .into_iter()
            .filter_map(RawColumn::into_column)
            .collect();
        if columns.is_empty() {
            return Ok(columns);
        }

        let virtual_url = format!("{url}/virtual-variables");
        match self.call(Method::GET, &virtual_url, &[], None).await {
            Ok(Value::Array(items)) => {
                let raw: Vec<RawColumn> = items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect();
                columns.extend(raw.into_iter().filter_map(RawColumn::into_column));
            }
            Ok(_) => {}
            Err(CatalogError::Status { status, .. }) => {
                warn!(dataset = %dataset.id, status, "Virtual variables unavailable");
            }
            Err(e) => return Err(e),
        }

        Ok(columns)
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    #[instrument(skip(self))]
    async fn search(&self, question: &str) -> Result<IndexMap<String, Dataset>, CatalogError> {
        let url = format!("{}/galaxy/dataset", self.config.search_url);
        let query = [
            ("keyword", question.to_string()),
            ("pageSize", self.config.paging.search_page_size.to_string()),
        ];
        let data = self.call(Method::GET, &url, &query, None).await?;

        let items: Vec<RawDataset> = match data {
            Value::Null => Vec::new(),
            other => serde_json::from_value(other)
                .map_err(|e| CatalogError::Decode(format!("search results: {e}")))?,
        };
        let datasets: IndexMap<String, Dataset> = items
            .into_iter()
            .map(Dataset::from)
            .map(|d| (d.id.clone(), d))
            .collect();

        info!(count = datasets.len(), "Catalog search returned datasets");
        Ok(datasets)
    }

    async fn column_metadata(
        &self,
        datasets: &[Dataset],
    ) -> Result<IndexMap<String, Dataset>, CatalogError> {
        let mut described = IndexMap::new();
        for dataset in datasets {
            let columns = match self.dataset_columns(dataset).await {
                Ok(columns) => columns,
                Err(CatalogError::Status { status, url, .. }) => {
                    warn!(dataset = %dataset.id, status, %url, "Metadata unavailable, skipping dataset");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if columns.is_empty() {
                warn!(dataset = %dataset.id, "Dataset has no usable columns, skipping");
                continue;
            }
            described.insert(dataset.id.clone(), dataset.clone().with_columns(columns));
        }
        Ok(described)
    }

    async fn filter_options(&self, chart: &mut ChartSpec) -> Result<(), CatalogError> {
        let url = format!("{}/api/exploration/{}/filter-options", chart.source_url, chart.id);
        let query = [
            ("start", "0".to_string()),
            (
                "pageSize",
                self.config.paging.filter_option_page_size.to_string(),
            ),
        ];

        for field in &mut chart.filter {
            field.operator = None;
            let body = json!({ "x": [&*field] });
            let rows = self.call(Method::POST, &url, &query, Some(&body)).await?;
            field.value = wire::option_values(&rows);
            debug!(column = %field.column_id(), options = field.value.len(), "Fetched filter options");
        }
        Ok(())
    }

    async fn execute(&self, chart: &mut ChartSpec) -> Result<(), CatalogError> {
        let url = format!("{}/api/exploration/{}", chart.source_url, chart.id);
        let query = [
            ("start", "0".to_string()),
            ("pageSize", self.config.paging.result_page_size.to_string()),
        ];
        let body = wire::exploration_body(chart)?;
        let data = self.call(Method::POST, &url, &query, Some(&body)).await?;
        chart.data = Some(data);
        Ok(())
    }
}
