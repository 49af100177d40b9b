use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Once;
use tempfile::NamedTempFile;
use threads_sheets_sync::retry::RetryPolicy;
use threads_sheets_sync::sheets_client::auth::ServiceAccountKey;
use threads_sheets_sync::sheets_client::SheetsClient;
use threads_sheets_sync::telemetry;
use threads_sheets_sync::threads_client::ThreadsClient;
use wiremock::MockServer;

pub const ACCESS_TOKEN: &str = "threads-test-token";
pub const SHEETS_TOKEN: &str = "ya29.test-token";
pub const SPREADSHEET_ID: &str = "sheet-1";
pub const CLIENT_EMAIL: &str = "sync@example-project.iam.gserviceaccount.com";
pub const TEST_KEY: &str = include_str!("../fixtures/test_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test_key.pub.pem");

static TRACING: Once = Once::new();

/// Logs only show up with `TEST_LOG` set.
pub fn init_tracing() {
    TRACING.call_once(|| {
        if std::env::var("TEST_LOG").is_ok() {
            telemetry::init_subscriber("debug");
        }
    });
}

pub fn threads_client(server: &MockServer) -> ThreadsClient {
    init_tracing();
    ThreadsClient::new(ACCESS_TOKEN)
        .expect("Failed to build client.")
        .with_base_url(&format!("{}/v1.0/", server.uri()))
        .expect("Failed to parse mock server url.")
        .with_retry_policy(RetryPolicy::immediate(2))
}

pub fn sheets_client(server: &MockServer) -> SheetsClient {
    init_tracing();
    SheetsClient::with_access_token(SHEETS_TOKEN)
        .expect("Failed to build client.")
        .with_base_url(&format!("{}/v4/", server.uri()))
        .expect("Failed to parse mock server url.")
        .with_retry_policy(RetryPolicy::immediate(2))
}

pub fn service_account_key(server: &MockServer) -> ServiceAccountKey {
    ServiceAccountKey {
        client_email: CLIENT_EMAIL.to_string(),
        private_key: TEST_KEY.to_string(),
        token_uri: format!("{}/token", server.uri()),
    }
}

/// A key file shaped like the one the Cloud console hands out.
pub fn service_account_file(server: &MockServer) -> NamedTempFile {
    let contents = json!({
        "type": "service_account",
        "project_id": "example-project",
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_KEY,
        "client_email": CLIENT_EMAIL,
        "client_id": "1234567890",
        "token_uri": format!("{}/token", server.uri()),
    });
    let mut file = NamedTempFile::new().expect("Failed to create key file.");
    file.write_all(contents.to_string().as_bytes())
        .expect("Failed to write key file.");
    file
}

pub fn token_response() -> Value {
    json!({
        "access_token": SHEETS_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer",
    })
}

pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

pub fn permalink(id: &str) -> String {
    format!("https://www.threads.net/@me/post/{id}")
}

pub fn post(id: &str, timestamp: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "media_type": "TEXT_POST",
        "permalink": permalink(id),
        "text": format!("post {id}"),
        "timestamp": timestamp.format("%Y-%m-%dT%H:%M:%S%z").to_string(),
    })
}

pub fn page(posts: Vec<Value>, after: Option<&str>) -> Value {
    match after {
        Some(after) => json!({
            "data": posts,
            "paging": {
                "cursors": { "before": "b", "after": after },
                "next": format!("https://graph.threads.net/v1.0/me/threads?after={after}"),
            },
        }),
        None => json!({ "data": posts }),
    }
}

/// Insights in the `values` shape, in metric order views, likes, replies, reposts, quotes,
/// shares.
pub fn insights(values: [i64; 6]) -> Value {
    let names = ["views", "likes", "replies", "reposts", "quotes", "shares"];
    let data: Vec<Value> = names
        .iter()
        .zip(values)
        .map(|(name, value)| {
            json!({
                "name": name,
                "period": "lifetime",
                "values": [{ "value": value }],
                "title": name,
                "id": format!("1/insights/{name}/lifetime"),
            })
        })
        .collect();
    json!({ "data": data })
}

pub fn header_row() -> Vec<&'static str> {
    vec![
        "Idx",
        "Date",
        "Text",
        "Topic",
        "Views",
        "Likes",
        "Replies",
        "Reposts",
        "Quotes",
        "Shares",
        "Permalink",
    ]
}

pub fn metadata(title: &str) -> Value {
    json!({
        "sheets": [
            { "properties": { "sheetId": 0, "title": "Summary" } },
            { "properties": { "sheetId": 7, "title": title } },
        ]
    })
}
