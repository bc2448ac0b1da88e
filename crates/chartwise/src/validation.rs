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

//! Column-role rules applied to model proposals.
//!
//! Everything here is pure: a rule either accepts a proposal, rewrites it
//! into its canonical form, or reports an [`AttemptError`] that sends the
//! stage back to the model.

use crate::error::AttemptError;
use crate::model::{
    AdminLevel, Calculation, ChartSpec, Column, ColumnType, FilterField, Granularity, Operator,
    TemporalFormat, YField,
};
use serde_json::Value;

const NUMERIC_OPERATORS: [Operator; 5] = [
    Operator::Range,
    Operator::Lt,
    Operator::Gt,
    Operator::Lte,
    Operator::Gte,
];

const ANY_OPERATOR: [Operator; 7] = [
    Operator::Eq,
    Operator::Lt,
    Operator::Gt,
    Operator::Lte,
    Operator::Gte,
    Operator::In,
    Operator::Range,
];

/// Resolves the `format` of an x or filter field.
///
/// Temporal columns need a temporal granularity and spatial columns an
/// admin level; anything else is rejected. Other column types never carry a
/// format, whatever was proposed.
pub fn resolve_format(
    column: &Column,
    proposed: Option<&str>,
) -> Result<Option<Granularity>, AttemptError> {
    let column_type = column.column_type;
    let resolved = if column_type.is_temporal() {
        proposed
            .and_then(TemporalFormat::parse)
            .map(Granularity::Temporal)
    } else if column_type.is_spatial() {
        proposed.and_then(AdminLevel::parse).map(Granularity::Admin)
    } else {
        return Ok(None);
    };

    match resolved {
        Some(format) => Ok(Some(format)),
        None => Err(AttemptError::InvalidFormat {
            column: column.column_id.clone(),
            column_type,
            value: proposed.map(str::to_string),
        }),
    }
}

/// Builds a y field, or `None` when the column cannot be aggregated or the
/// calculation is outside the supported set.
pub fn accept_measure(column: &Column, calculation: Option<&str>) -> Option<YField> {
    if !column.column_type.is_numeric() {
        return None;
    }
    let calculation = calculation.and_then(Calculation::parse)?;
    Some(YField {
        column: column.clone(),
        calculation,
    })
}

pub fn allowed_operators(column_type: ColumnType) -> &'static [Operator] {
    match column_type {
        ColumnType::Date | ColumnType::Datetime | ColumnType::Nominal | ColumnType::Space => {
            &[Operator::In]
        }
        ColumnType::Integer | ColumnType::Float => &NUMERIC_OPERATORS,
        _ => &ANY_OPERATOR,
    }
}

pub fn check_operator(column: &Column, operator: Operator) -> Result<(), AttemptError> {
    if allowed_operators(column.column_type).contains(&operator) {
        Ok(())
    } else {
        Err(AttemptError::invalid_operator(
            &column.column_id,
            column.column_type,
            operator,
        ))
    }
}

/// The proposed filter list must name the same columns, in the same order.
pub fn check_filter_shape(
    chart: &ChartSpec,
    proposed: &[Option<String>],
) -> Result<(), AttemptError> {
    let expected = chart.filter_ids();
    let same = expected.len() == proposed.len()
        && expected
            .iter()
            .zip(proposed)
            .all(|(want, got)| got.as_deref() == Some(*want));

    if same {
        return Ok(());
    }
    Err(AttemptError::FilterMismatch {
        chart: chart.id.clone(),
        expected: expected.into_iter().map(str::to_string).collect(),
        actual: proposed
            .iter()
            .map(|id| id.clone().unwrap_or_default())
            .collect(),
    })
}

/// Reads a filter value as a list of strings. Scalars become a one-element
/// list and `null` an empty one; nested structures are rejected.
pub fn coerce_values(column: &str, value: Option<&Value>) -> Result<Vec<String>, AttemptError> {
    let invalid = |reason: &str| AttemptError::InvalidValue {
        column: column.to_string(),
        reason: reason.to_string(),
    };

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| scalar_to_string(item).ok_or_else(|| invalid("list items must be scalars")))
            .collect(),
        Some(Value::Object(_)) => Err(invalid("expected a list of values, found an object")),
        Some(scalar) => Ok(scalar_to_string(scalar).into_iter().collect()),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Applies a refined operator and value to a planned filter field.
pub fn refine_filter(
    planned: &FilterField,
    operator: Option<&str>,
    value: Option<&Value>,
) -> Result<FilterField, AttemptError> {
    let column = &planned.column;
    let value = coerce_values(&column.column_id, value)?;

    let operator = match operator {
        Some(token) => {
            let op = Operator::parse(token).ok_or_else(|| AttemptError::InvalidOperator {
                column: column.column_id.clone(),
                column_type: column.column_type,
                operator: token.to_string(),
            })?;
            check_operator(column, op)?;
            Some(op)
        }
        None if value.is_empty() => None,
        None => {
            return Err(AttemptError::InvalidValue {
                column: column.column_id.clone(),
                reason: "values were given without an operator".to_string(),
            })
        }
    };

    Ok(FilterField {
        operator,
        value,
        ..planned.clone()
    })
}

/// Drops `format` from every x and filter field whose type does not carry one.
pub fn normalise_formats(mut chart: ChartSpec) -> ChartSpec {
    for field in &mut chart.x {
        if !field.column.column_type.carries_format() {
            field.format = None;
        }
    }
    for field in &mut chart.filter {
        if !field.column.column_type.carries_format() {
            field.format = None;
        }
    }
    chart
}
