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

use catalog_client::{CatalogClient, CatalogConfig, Credentials};
use chartwise::{
    Catalog, CatalogError, ChartSpec, Column, ColumnType, Dataset, FilterField, Operator,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_login(server: &MockServer, expected_logins: u64) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "analyst", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"accessToken": "tok-1"}})),
        )
        .expect(expected_logins)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> CatalogClient {
    let config = CatalogConfig::new(format!("{}/api", server.uri()), format!("{}/login", server.uri()));
    CatalogClient::new(config, Credentials::new("analyst", "secret")).unwrap()
}

fn dataset_at(server: &MockServer, id: &str) -> Dataset {
    let mut dataset = Dataset::new(id, format!("Dataset {id}"));
    dataset.source_url = server.uri();
    dataset
}

#[tokio::test]
async fn search_logs_in_and_trims_source_urls() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/dataset"))
        .and(query_param("keyword", "Malaysia GDP"))
        .and(query_param("pageSize", "50"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"list": [
                {"id": "A", "name": "GDP Malaysia", "description": "Yearly GDP",
                 "sourceURL": "https://site.example/admin/dataset/A", "sourceType": "csv"},
                {"id": "B", "name": "Weather Japan", "sourceURL": "https://other.example"}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let found = client.search("Malaysia GDP").await.unwrap();

    assert_eq!(found.keys().collect::<Vec<_>>(), ["A", "B"]);
    assert_eq!(found["A"].source_url, "https://site.example");
    assert_eq!(found["A"].description, "Yearly GDP");
    assert_eq!(found["B"].source_url, "https://other.example");
    assert!(found["A"].columns.is_none());
}

#[tokio::test]
async fn rejected_token_triggers_one_relogin() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/dataset"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/dataset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"list": []}})))
        .expect(1)
        .mount(&server)
        .await;

    let found = client_for(&server).search("anything").await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn second_rejection_is_unauthorized() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/dataset"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let err = client_for(&server).search("anything").await.unwrap_err();
    assert!(matches!(err, CatalogError::Unauthorized));
}

#[tokio::test]
async fn failed_login_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad password"))
        .mount(&server)
        .await;

    let err = client_for(&server).search("anything").await.unwrap_err();
    match err {
        CatalogError::Login(message) => assert!(message.contains("bad password")),
        other => panic!("expected login error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/dataset"))
        .respond_with(ResponseTemplate::new(500).set_body_string("index offline"))
        .mount(&server)
        .await;

    let err = client_for(&server).search("anything").await.unwrap_err();
    match err {
        CatalogError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "index offline");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn column_metadata_keeps_visible_typed_columns_and_virtual_variables() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"columns": [
                {"id": "c1", "displayName": "Year", "type": "date", "visible": true},
                {"id": "c2", "displayName": "Region", "type": "nominal", "visible": true},
                {"id": "c3", "displayName": "GDP", "type": "float", "visible": true},
                {"id": "c4", "displayName": "Internal", "type": "float", "visible": false},
                {"id": "c5", "displayName": "Raw", "type": "undefined", "visible": true}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/A/virtual-variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "v1", "name": "GDP per capita", "type": "float"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"columns": []}})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let described = client
        .column_metadata(&[dataset_at(&server, "A"), dataset_at(&server, "B")])
        .await
        .unwrap();

    assert_eq!(described.len(), 1);
    let columns = described["A"].columns.as_ref().unwrap();
    assert_eq!(columns.keys().collect::<Vec<_>>(), ["c1", "c2", "c3", "v1"]);
    assert_eq!(columns["c1"].column_type, ColumnType::Date);
    assert_eq!(columns["v1"].display_name, "GDP per capita");
}

#[tokio::test]
async fn missing_virtual_variables_do_not_fail_metadata() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"columns": [{"id": "c1", "displayName": "Year", "type": "date", "visible": true}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/A/virtual-variables"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let described = client_for(&server)
        .column_metadata(&[dataset_at(&server, "A")])
        .await
        .unwrap();
    assert_eq!(described["A"].columns.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn dataset_with_unavailable_metadata_is_dropped() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"columns": [{"id": "c1", "displayName": "Year", "type": "date", "visible": true}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/A/virtual-variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/B"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&server)
        .await;

    let described = client_for(&server)
        .column_metadata(&[dataset_at(&server, "A"), dataset_at(&server, "B")])
        .await
        .unwrap();

    assert_eq!(described.keys().collect::<Vec<_>>(), ["A"]);
    assert_eq!(described["A"].columns.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn metadata_auth_failure_stays_fatal() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/api/dataset/A"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .column_metadata(&[dataset_at(&server, "A")])
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Unauthorized));
}

fn region_chart(server: &MockServer) -> ChartSpec {
    let dataset = dataset_at(server, "A");
    let mut chart = ChartSpec::for_dataset(&dataset);
    chart.filter.push(FilterField {
        column: Column::new("c2", "Region", ColumnType::Nominal),
        format: None,
        operator: Some(Operator::In),
        value: vec!["placeholder".into()],
    });
    chart
}

#[tokio::test]
async fn filter_options_replace_values_and_clear_operator() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/exploration/A/filter-options"))
        .and(query_param("start", "0"))
        .and(query_param("pageSize", "1000"))
        .and(body_partial_json(json!({"x": [{"columnID": "c2"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"list": [{"x": [["Johor"]]}, {"x": [["Selangor"]]}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut chart = region_chart(&server);
    client_for(&server).filter_options(&mut chart).await.unwrap();

    assert_eq!(chart.filter[0].value, ["Johor", "Selangor"]);
    assert_eq!(chart.filter[0].operator, None);
}

#[tokio::test]
async fn execute_wraps_filters_and_stores_result() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/exploration/A"))
        .and(query_param("pageSize", "50"))
        .and(body_partial_json(json!({"id": "A", "filter": [[{"columnID": "c2"}]]})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [["Johor", 12.5]]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut chart = region_chart(&server);
    chart.filter[0].value = vec!["Johor".into()];
    client_for(&server).execute(&mut chart).await.unwrap();

    assert_eq!(chart.data, Some(json!([["Johor", 12.5]])));
}

#[test]
fn empty_urls_are_rejected() {
    let result = CatalogClient::new(CatalogConfig::new("", ""), Credentials::new("a", "b"));
    assert!(matches!(result, Err(CatalogError::Configuration(_))));
}
