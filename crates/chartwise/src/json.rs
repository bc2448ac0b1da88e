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

//! Pulling JSON out of model replies.

use crate::error::AttemptError;
use llm_contracts::LLMResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)```").unwrap());

/// Body of the last ```json fence in `text`, if any.
pub fn last_json_block(text: &str) -> Option<&str> {
    JSON_FENCE
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Parses a free-text reply that is expected to end in a JSON answer.
///
/// The last ```json fence wins. Without one, the whole reply is tried, then
/// the outermost `{...}` span.
pub fn parse_text_reply(text: &str) -> Result<Value, AttemptError> {
    if let Some(block) = last_json_block(text) {
        debug!("parsing last fenced json block");
        return serde_json::from_str(block).map_err(|e| AttemptError::Parse(e.to_string()));
    }

    match serde_json::from_str(text.trim()) {
        Ok(value) => Ok(value),
        Err(whole_err) => match outer_object(text) {
            Some(span) => serde_json::from_str(span).map_err(|e| AttemptError::Parse(e.to_string())),
            None => Err(AttemptError::Parse(whole_err.to_string())),
        },
    }
}

/// The structured object of a schema-constrained reply. Falls back to the
/// text when the model implementation only returned content.
pub fn structured_payload(response: &LLMResponse) -> Result<Value, AttemptError> {
    match &response.structured {
        Some(value) => Ok(value.clone()),
        None => parse_text_reply(&response.content),
    }
}

/// Deserialises an untrusted reply into its intermediate form.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, AttemptError> {
    serde_json::from_value(value).map_err(|e| AttemptError::Shape(e.to_string()))
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Non-empty string content of an optional reply field.
pub(crate) fn token(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_fenced_block_is_authoritative() {
        let reply = "Phase 1: thinking\n```json\n{\"charts\": [1]}\n```\nrevised:\n```json\n{\"charts\": [2]}\n```\n";
        assert_eq!(parse_text_reply(reply).unwrap(), json!({"charts": [2]}));
    }

    #[test]
    fn bare_json_and_embedded_objects_are_accepted() {
        assert_eq!(parse_text_reply(" {\"a\": 1} ").unwrap(), json!({"a": 1}));
        assert_eq!(
            parse_text_reply("Here you go: {\"a\": \"}\"} done").unwrap(),
            json!({"a": "}"})
        );
    }

    #[test]
    fn prose_without_json_fails() {
        assert!(matches!(
            parse_text_reply("I could not find anything."),
            Err(AttemptError::Parse(_))
        ));
        assert!(parse_text_reply("```json\n{broken\n```").is_err());
    }

    #[test]
    fn token_ignores_blank_and_non_string_values() {
        assert_eq!(token(Some(&json!(" year "))), Some("year"));
        assert_eq!(token(Some(&json!(""))), None);
        assert_eq!(token(Some(&json!(3))), None);
        assert_eq!(token(None), None);
    }
}
