pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod http;
pub mod layout;
pub mod post;
pub mod reconcile;
pub mod retry;
pub mod sheet;
pub mod sheets_client;
pub mod telemetry;
pub mod threads_client;

use crate::config::RunParameters;
use crate::error::Result;
use crate::reconcile::{ReconcileOptions, SyncSummary};
use crate::sheets_client::auth::ServiceAccountKey;
use crate::sheets_client::SheetsClient;
use crate::threads_client::ThreadsClient;
use tracing::info;

/// Fetch, then reconcile. The credentials file is read up front so a bad path fails before any
/// network traffic.
pub async fn run(params: &RunParameters) -> Result<SyncSummary> {
    let key = ServiceAccountKey::from_file(&params.creds_json)?;

    let threads_client = ThreadsClient::new(&params.access_token)?
        .with_base_url(&params.threads_api_url)?
        .with_retry_policy(params.retry_policy);
    info!(
        "Fetching up to {} posts from {} to {}",
        params.limit, params.range.since, params.range.until
    );
    let report = fetch::fetch_posts(&threads_client, &params.range, params.limit).await?;

    let sheets_client = SheetsClient::authorize(&key, params.retry_policy)
        .await?
        .with_base_url(&params.sheets_api_url)?;
    let worksheet = sheets_client
        .worksheet(&params.spreadsheet_id, &params.worksheet)
        .await?;
    let options = ReconcileOptions {
        timezone: params.timezone,
        topics: params.topics.clone(),
    };
    let summary = reconcile::reconcile(&worksheet, &report.records, &options).await?;

    info!(
        "Sync finished: {} updated, {} appended, {} skipped",
        summary.updated,
        summary.appended,
        report.skipped.len()
    );
    Ok(summary)
}
