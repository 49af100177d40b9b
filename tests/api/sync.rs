use crate::helpers::{
    at, header_row, init_tracing, insights, metadata, page, permalink, post,
    service_account_file, token_response, SPREADSHEET_ID,
};
use chrono::{DateTime, Utc};
use claims::{assert_err, assert_matches, assert_ok};
use clap::Parser;
use serde_json::json;
use std::path::Path;
use threads_sheets_sync::config::{Args, RunParameters};
use threads_sheets_sync::error::SyncError;
use threads_sheets_sync::reconcile::SyncSummary;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn parameters(server: &MockServer, creds_json: &Path) -> RunParameters {
    init_tracing();
    let args = Args::try_parse_from([
        "threads-sheets-sync",
        "--access-token=threads-test-token",
        format!("--creds-json={}", creds_json.display()).as_str(),
        format!("--spreadsheet-id={SPREADSHEET_ID}").as_str(),
        "--worksheet=Posts",
        "--since=2024-05-01",
        "--until=2024-06-01",
        "--max-retries=0",
        format!("--threads-api-url={}/v1.0/", server.uri()).as_str(),
        format!("--sheets-api-url={}/v4/", server.uri()).as_str(),
    ])
    .expect("Failed to parse arguments.");
    let now: DateTime<Utc> = at(24 * 40);
    RunParameters::from_args(args, now).expect("Failed to build run parameters.")
}

async fn mount_threads(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(vec![post("B", at(2)), post("A", at(1))], None)),
        )
        .expect(1)
        .mount(server)
        .await;
    for (id, views) in [("A", 50), ("B", 20)] {
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/{id}/insights")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insights([views, 2, 0, 0, 0, 0])),
            )
            .expect(1)
            .mount(server)
            .await;
    }
}

async fn mount_sheets(server: &MockServer, values: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response()))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata("Posts")))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}/values/'Posts'")))
        .respond_with(ResponseTemplate::new(200).set_body_json(values))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}:batchUpdate")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "replies": [] })))
        .expect(1)
        .mount(server)
        .await;
}

fn values_batch_update() -> String {
    format!("/v4/spreadsheets/{SPREADSHEET_ID}/values:batchUpdate")
}

fn new_row(idx: u64, date: &str, id: &str, views: u64) -> serde_json::Value {
    json!([
        idx,
        date,
        format!("'post {id}"),
        "",
        views,
        2,
        0,
        0,
        0,
        0,
        permalink(id)
    ])
}

#[tokio::test]
async fn known_posts_are_refreshed_and_new_ones_appended() {
    // Arrange
    let server = MockServer::start().await;
    let creds = service_account_file(&server);
    mount_threads(&server).await;
    mount_sheets(
        &server,
        json!({
            "range": "'Posts'!A1:K2",
            "majorDimension": "ROWS",
            "values": [
                header_row(),
                [
                    "1",
                    "2024-05-01 10:00",
                    "post A",
                    "AI",
                    "3",
                    "0",
                    "0",
                    "0",
                    "0",
                    "0",
                    permalink("A")
                ],
            ],
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(values_batch_update()))
        .and(body_json(json!({
            "valueInputOption": "USER_ENTERED",
            "data": [
                { "range": "'Posts'!E2:J2", "values": [[50, 2, 0, 0, 0, 0]] },
                { "range": "'Posts'!A3:K3", "values": [new_row(2, "2024-05-01 11:00", "B", 20)] },
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let summary = assert_ok!(threads_sheets_sync::run(&parameters(&server, creds.path())).await);

    // Assert
    assert_eq!(
        summary,
        SyncSummary {
            updated: 1,
            appended: 1
        }
    );
}

#[tokio::test]
async fn an_empty_worksheet_gets_a_header_first() {
    // Arrange
    let server = MockServer::start().await;
    let creds = service_account_file(&server);
    mount_threads(&server).await;
    mount_sheets(&server, json!({ "range": "'Posts'!A1:Z1000", "majorDimension": "ROWS" })).await;
    Mock::given(method("POST"))
        .and(path(values_batch_update()))
        .and(body_json(json!({
            "valueInputOption": "USER_ENTERED",
            "data": [
                { "range": "'Posts'!A1:K1", "values": [header_row()] },
                { "range": "'Posts'!A2:K2", "values": [new_row(1, "2024-05-01 10:00", "A", 50)] },
                { "range": "'Posts'!A3:K3", "values": [new_row(2, "2024-05-01 11:00", "B", 20)] },
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let summary = assert_ok!(threads_sheets_sync::run(&parameters(&server, creds.path())).await);

    // Assert
    assert_eq!(summary.appended, 2);
    assert_eq!(summary.updated, 0);
}

#[tokio::test]
async fn a_missing_key_file_fails_before_any_request() {
    // Arrange
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Act
    let result =
        threads_sheets_sync::run(&parameters(&server, &dir.path().join("missing.json"))).await;

    // Assert
    assert_matches!(assert_err!(result), SyncError::Credentials(_));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_keys_in_the_sheet_abort_before_writing() {
    // Arrange
    let server = MockServer::start().await;
    let creds = service_account_file(&server);
    mount_threads(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata("Posts")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}/values/'Posts'")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [
                header_row(),
                ["1", "", "", "", "", "", "", "", "", "", permalink("A")],
                ["2", "", "", "", "", "", "", "", "", "", permalink("A")],
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .with_priority(10)
        .named("any write")
        .mount(&server)
        .await;

    // Act
    let result = threads_sheets_sync::run(&parameters(&server, creds.path())).await;

    // Assert
    assert_matches!(assert_err!(result), SyncError::WriteConflict(_));
}
