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

//! Catalog datasets, their columns, and the chart specifications built from them.
//!
//! Field names follow the catalog's wire format (`columnID`, `sourceURL`, ...)
//! so that a [`ChartSpec`] can be posted to the exploration endpoint as-is.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Parses a single wire token into one of the closed vocabularies below.
fn parse_token<T: DeserializeOwned>(token: &str) -> Option<T> {
    serde_json::from_value(Value::String(token.trim().to_string())).ok()
}

fn token_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Date,
    Datetime,
    Space,
    Point,
    Line,
    Polygon,
    Nominal,
    Ordinal,
    Integer,
    Float,
}

impl ColumnType {
    pub fn parse(token: &str) -> Option<Self> {
        parse_token(token)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Datetime)
    }

    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            ColumnType::Space | ColumnType::Point | ColumnType::Line | ColumnType::Polygon
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Types whose `format` survives into an executed query.
    pub fn carries_format(&self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::Datetime | ColumnType::Space
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&token_name(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalFormat {
    Year,
    Quarter,
    Month,
    Week,
    Date,
    Day,
    Weekday,
    YearMonth,
    YearQuarter,
    YearWeek,
    MonthDay,
    DayHour,
    Hour,
    Minute,
    Second,
    HourMinute,
    Time,
}

impl TemporalFormat {
    pub const ALL: [TemporalFormat; 17] = [
        TemporalFormat::Year,
        TemporalFormat::Quarter,
        TemporalFormat::Month,
        TemporalFormat::Week,
        TemporalFormat::Date,
        TemporalFormat::Day,
        TemporalFormat::Weekday,
        TemporalFormat::YearMonth,
        TemporalFormat::YearQuarter,
        TemporalFormat::YearWeek,
        TemporalFormat::MonthDay,
        TemporalFormat::DayHour,
        TemporalFormat::Hour,
        TemporalFormat::Minute,
        TemporalFormat::Second,
        TemporalFormat::HourMinute,
        TemporalFormat::Time,
    ];

    pub fn parse(token: &str) -> Option<Self> {
        parse_token(token)
    }
}

/// Administrative-geography granularity, from country (2) down to block (10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminLevel {
    #[serde(rename = "admin_level_2")]
    Level2,
    #[serde(rename = "admin_level_3")]
    Level3,
    #[serde(rename = "admin_level_4")]
    Level4,
    #[serde(rename = "admin_level_5")]
    Level5,
    #[serde(rename = "admin_level_6")]
    Level6,
    #[serde(rename = "admin_level_7")]
    Level7,
    #[serde(rename = "admin_level_8")]
    Level8,
    #[serde(rename = "admin_level_9")]
    Level9,
    #[serde(rename = "admin_level_10")]
    Level10,
}

impl AdminLevel {
    pub fn parse(token: &str) -> Option<Self> {
        parse_token(token)
    }
}

/// The `format` of an x or filter field. Serialised as its bare token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Granularity {
    Temporal(TemporalFormat),
    Admin(AdminLevel),
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&token_name(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calculation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    DistinctCount,
}

impl Calculation {
    pub fn parse(token: &str) -> Option<Self> {
        parse_token(token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Lte,
    Gte,
    In,
    Range,
}

impl Operator {
    pub fn parse(token: &str) -> Option<Self> {
        parse_token(token)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&token_name(self))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(rename = "columnID")]
    pub column_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Column {
    pub fn new(
        column_id: impl Into<String>,
        display_name: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        Self {
            column_id: column_id.into(),
            display_name: display_name.into(),
            column_type,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "sourceURL", default)]
    pub source_url: String,
    /// Keyed by `columnID`; `None` until column metadata has been fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<IndexMap<String, Column>>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            source_url: String::new(),
            columns: None,
        }
    }

    pub fn with_columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns = Some(
            columns
                .into_iter()
                .map(|c| (c.column_id.clone(), c))
                .collect(),
        );
        self
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.as_ref()?.get(column_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XField {
    #[serde(flatten)]
    pub column: Column,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Granularity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YField {
    #[serde(flatten)]
    pub column: Column,
    pub calculation: Calculation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterField {
    #[serde(flatten)]
    pub column: Column,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Granularity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub value: Vec<String>,
}

impl FilterField {
    pub fn column_id(&self) -> &str {
        &self.column.column_id
    }
}

/// One chart against one dataset. `data` is filled in by query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "sourceURL", default)]
    pub source_url: String,
    #[serde(default)]
    pub x: Vec<XField>,
    #[serde(default)]
    pub y: Vec<YField>,
    #[serde(default)]
    pub filter: Vec<FilterField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ChartSpec {
    /// An empty chart carrying the dataset's identity.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        Self {
            id: dataset.id.clone(),
            name: dataset.name.clone(),
            description: dataset.description.clone(),
            source_url: dataset.source_url.clone(),
            x: Vec::new(),
            y: Vec::new(),
            filter: Vec::new(),
            data: None,
        }
    }

    pub fn filter_ids(&self) -> Vec<&str> {
        self.filter.iter().map(FilterField::column_id).collect()
    }
}
