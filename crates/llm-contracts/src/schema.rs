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

//! Declared shapes for structured model output.
//!
//! Only the subset of JSON Schema that providers accept for constrained
//! decoding is checked here: `type`, `properties`, `required` and `items`.

use crate::types::{LLMError, LLMResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Parses a raw reply and checks it against the schema.
    ///
    /// Providers that cannot constrain decoding natively sometimes wrap the
    /// object in a markdown fence; a single surrounding fence is tolerated.
    pub fn parse_reply(&self, content: &str) -> LLMResult<Value> {
        let body = strip_fence(content.trim());
        let value: Value = serde_json::from_str(body).map_err(|e| LLMError::SchemaMismatch {
            schema: self.name.clone(),
            reason: format!("reply is not valid JSON: {e}"),
        })?;
        self.check(&value)?;
        Ok(value)
    }

    pub fn check(&self, value: &Value) -> LLMResult<()> {
        check_node(&self.schema, value, "$").map_err(|reason| LLMError::SchemaMismatch {
            schema: self.name.clone(),
            reason,
        })
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn check_node(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        let matches = match expected {
            "object" => value.is_object(),
            "array" => value.is_array(),
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "null" => value.is_null(),
            _ => true,
        };
        if !matches {
            return Err(format!("{path} should be {expected}, found {}", kind(value)));
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for field in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(field) {
                    return Err(format!("{path}.{field} is required"));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (field, field_schema) in properties {
                if let Some(field_value) = object.get(field) {
                    check_node(field_schema, field_value, &format!("{path}.{field}"))?;
                }
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (index, item) in array.iter().enumerate() {
            check_node(items, item, &format!("{path}[{index}]"))?;
        }
    }

    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys_schema() -> OutputSchema {
        OutputSchema::new(
            "dataset_selection",
            json!({
                "type": "object",
                "properties": {
                    "dataset_key": {"type": "array", "items": {"type": "string"}},
                    "dataset_name": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["dataset_key", "dataset_name"]
            }),
        )
    }

    #[test]
    fn accepts_conforming_reply() {
        let value = keys_schema()
            .parse_reply(r#"{"dataset_key": ["a"], "dataset_name": ["GDP"]}"#)
            .unwrap();
        assert_eq!(value["dataset_key"][0], "a");
    }

    #[test]
    fn accepts_fenced_reply() {
        let reply = "```json\n{\"dataset_key\": [], \"dataset_name\": []}\n```";
        assert!(keys_schema().parse_reply(reply).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = keys_schema()
            .parse_reply(r#"{"dataset_key": ["a"]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("dataset_name is required"));
    }

    #[test]
    fn rejects_wrong_item_type() {
        let err = keys_schema()
            .parse_reply(r#"{"dataset_key": [1], "dataset_name": []}"#)
            .unwrap_err();
        match err {
            LLMError::SchemaMismatch { schema, reason } => {
                assert_eq!(schema, "dataset_selection");
                assert!(reason.contains("$.dataset_key[0]"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_json() {
        assert!(keys_schema().parse_reply("I think dataset a").is_err());
    }
}
