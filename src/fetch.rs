use crate::config::DateRange;
use crate::error::{Result, SyncError};
use crate::post::{Metrics, PostDraft, PostRecord};
use crate::threads_client::{api, PostsPage, ThreadsClient, MAX_PAGE_SIZE};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Where posts come from. [ThreadsClient] in production.
#[async_trait]
pub trait PostSource {
    async fn list_posts(
        &self,
        range: &DateRange,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<PostsPage>;

    async fn post_insights(&self, media_id: &str) -> Result<Vec<api::Insight>>;
}

#[async_trait]
impl PostSource for ThreadsClient {
    async fn list_posts(
        &self,
        range: &DateRange,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<PostsPage> {
        ThreadsClient::list_posts(self, range, page_size, after).await
    }

    async fn post_insights(&self, media_id: &str) -> Result<Vec<api::Insight>> {
        ThreadsClient::post_insights(self, media_id).await
    }
}

#[derive(Debug, Default)]
pub struct FetchReport {
    /// Sorted by timestamp, oldest first.
    pub records: Vec<PostRecord>,
    /// Entries dropped as [SyncError::MalformedRecord].
    pub skipped: Vec<SyncError>,
}

/// Pages through the listing until `limit` records are collected or the listing runs out, then
/// attaches a metrics snapshot to each.
pub async fn fetch_posts<S>(source: &S, range: &DateRange, limit: usize) -> Result<FetchReport>
where
    S: PostSource + Sync + ?Sized,
{
    let mut report = FetchReport::default();
    let mut after: Option<String> = None;
    let mut pages = 0;

    'pages: while report.records.len() < limit {
        let remaining = limit - report.records.len();
        let page = source
            .list_posts(range, remaining.min(MAX_PAGE_SIZE), after.as_deref())
            .await?;
        pages += 1;
        let page_was_empty = page.entries.is_empty();

        for entry in page.entries {
            if report.records.len() >= limit {
                break 'pages;
            }
            let draft = match entry.and_then(PostDraft::try_from) {
                Ok(draft) => draft,
                Err(err) => {
                    skip(&mut report, err)?;
                    continue;
                }
            };
            if draft.is_repost_facade() {
                debug!("Skipping repost {}", draft.id);
                continue;
            }
            if !range.contains(&draft.timestamp) {
                debug!("Skipping {} at {}, outside range", draft.id, draft.timestamp);
                continue;
            }

            let metrics = source
                .post_insights(&draft.id)
                .await
                .and_then(|insights| Metrics::from_insights(&draft.id, &insights));
            match metrics {
                Ok(metrics) => report.records.push(draft.with_metrics(metrics)),
                Err(err) => skip(&mut report, err)?,
            }
        }

        match page.next_cursor {
            Some(cursor) if !page_was_empty => after = Some(cursor),
            _ => break,
        }
    }

    report.records.sort_by_key(|record| record.timestamp);
    info!(
        "Fetched {} posts over {} pages ({} skipped)",
        report.records.len(),
        pages,
        report.skipped.len()
    );
    Ok(report)
}

/// Malformed entries are logged and set aside; anything else aborts the fetch.
fn skip(report: &mut FetchReport, err: SyncError) -> Result<()> {
    match err {
        SyncError::MalformedRecord { .. } => {
            warn!("Skipping {err}");
            report.skipped.push(err);
            Ok(())
        }
        err => Err(err),
    }
}
