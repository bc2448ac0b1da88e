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

//! Catalog response shapes and their conversion into pipeline types.

use chartwise::{CatalogError, ChartSpec, Column, ColumnType, Dataset};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Unwraps the `{"data": ...}` envelope, returning `data.list` when present.
pub(crate) fn unwrap_envelope(body: Value) -> Result<Value, CatalogError> {
    let Value::Object(mut envelope) = body else {
        return Err(CatalogError::Decode("response is not a JSON object".into()));
    };
    let data = envelope
        .remove("data")
        .ok_or_else(|| CatalogError::Decode("response has no 'data' field".into()))?;

    match data {
        Value::Object(mut inner) if inner.contains_key("list") => {
            Ok(inner.remove("list").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDataset {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "sourceURL", default)]
    source_url: String,
}

impl From<RawDataset> for Dataset {
    fn from(raw: RawDataset) -> Self {
        let source_url = match raw.source_url.find("/admin") {
            Some(cut) => raw.source_url[..cut].to_string(),
            None => raw.source_url,
        };
        Dataset {
            id: raw.id,
            name: raw.name,
            description: raw.description.unwrap_or_default(),
            source_url,
            columns: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawColumn {
    id: String,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    column_type: String,
    #[serde(default)]
    description: Option<String>,
    /// Absent on virtual variables, which are always shown.
    #[serde(default)]
    visible: Option<bool>,
}

impl RawColumn {
    /// `None` for hidden columns and types the pipeline cannot use.
    pub(crate) fn into_column(self) -> Option<Column> {
        if self.visible == Some(false) {
            return None;
        }
        let Some(column_type) = ColumnType::parse(&self.column_type) else {
            debug!(column = %self.id, r#type = %self.column_type, "skipping column of unsupported type");
            return None;
        };
        Some(Column {
            display_name: self
                .display_name
                .or(self.name)
                .unwrap_or_else(|| self.id.clone()),
            column_id: self.id,
            column_type,
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMetadata {
    #[serde(default)]
    pub columns: Vec<RawColumn>,
}

/// First cell of each filter-option row, as a string.
pub(crate) fn option_values(rows: &Value) -> Vec<String> {
    rows.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match &item["x"][0][0] {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Query body for the exploration endpoint: all filters form one AND group.
pub(crate) fn exploration_body(chart: &ChartSpec) -> Result<Value, CatalogError> {
    let mut body = serde_json::to_value(chart)
        .map_err(|e| CatalogError::Decode(format!("cannot encode chart '{}': {e}", chart.id)))?;
    if let Value::Object(map) = &mut body {
        let filter = map.remove("filter").unwrap_or_else(|| json!([]));
        map.insert("filter".to_string(), json!([filter]));
        map.remove("data");
    }
    Ok(body)
}
