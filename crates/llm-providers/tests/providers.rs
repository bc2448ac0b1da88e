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

use std::time::Duration;

use llm_contracts::{GenerationConfig, LLMError, LLMRequest, LanguageModel, OutputSchema};
use llm_providers::{AnthropicClient, ChatModel, OpenAIClient, TransportPolicy};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> TransportPolicy {
    TransportPolicy {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        backoff: Duration::from_millis(5),
    }
}

fn openai_reply(content: &str) -> serde_json::Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
    })
}

fn selection_schema() -> OutputSchema {
    OutputSchema::new(
        "dataset_selection",
        json!({
            "type": "object",
            "required": ["dataset_key"],
            "properties": {"dataset_key": {"type": "array", "items": {"type": "string"}}}
        }),
    )
}

#[tokio::test]
async fn openai_structured_reply_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(openai_reply(r#"{"dataset_key": ["d1"]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAIClient::new(
        "test-key".into(),
        Some(format!("{}/v1/chat/completions", server.uri())),
        fast_policy(),
    )
    .unwrap();
    let model = ChatModel::new(client, "gpt-4o", GenerationConfig::default());

    let request = LLMRequest::new("Which datasets?").with_output_schema(selection_schema());
    let response = model.invoke(request).await.unwrap();

    assert_eq!(response.structured.unwrap()["dataset_key"][0], "d1");
    assert_eq!(response.usage.total_tokens, 16);
    assert_eq!(response.provider_used, "openai");
}

#[tokio::test]
async fn reply_violating_schema_is_a_schema_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(openai_reply(r#"{"dataset_key": "d1"}"#)),
        )
        .mount(&server)
        .await;

    let client = OpenAIClient::new("k".into(), Some(server.uri()), fast_policy()).unwrap();
    let model = ChatModel::new(client, "gpt-4o", GenerationConfig::default());

    let err = model
        .invoke(LLMRequest::new("q").with_output_schema(selection_schema()))
        .await
        .unwrap_err();
    assert!(matches!(err, LLMError::SchemaMismatch { .. }));
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("plain text")))
        .mount(&server)
        .await;

    let client = OpenAIClient::new("k".into(), Some(server.uri()), fast_policy()).unwrap();
    let model = ChatModel::new(client, "gpt-4o", GenerationConfig::default());

    let response = model.invoke(LLMRequest::new("q")).await.unwrap();
    assert_eq!(response.content, "plain text");
    assert!(response.structured.is_none());
}

#[tokio::test]
async fn authentication_failures_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAIClient::new("k".into(), Some(server.uri()), fast_policy()).unwrap();
    let model = ChatModel::new(client, "gpt-4o", GenerationConfig::default());

    let err = model.invoke(LLMRequest::new("q")).await.unwrap_err();
    assert!(matches!(err, LLMError::Authentication(_)));
}

#[tokio::test]
async fn anthropic_reply_is_read_from_first_content_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-api-key", "anthropic-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "{\"dataset_key\": [\"d2\"]}"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 30, "output_tokens": 6}
        })))
        .mount(&server)
        .await;

    let client = AnthropicClient::new(
        "anthropic-key".into(),
        Some(server.uri()),
        None,
        fast_policy(),
    )
    .unwrap();
    let model = ChatModel::new(client, "claude-sonnet", GenerationConfig::default());

    let response = model
        .invoke(LLMRequest::new("q").with_output_schema(selection_schema()))
        .await
        .unwrap();

    assert_eq!(response.structured.unwrap()["dataset_key"][0], "d2");
    assert_eq!(response.usage.total_tokens, 36);
}
