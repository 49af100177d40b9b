pub mod api;

use crate::config::DateRange;
use crate::error::{Result, SyncError};
use crate::http::{self, HttpsClient, RawResponse};
use crate::retry::RetryPolicy;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use hyper::{Body, Method, Request, StatusCode};
use nonzero_ext::nonzero;
use oauth2::AccessToken;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const THREADS_API_URL: &str = "https://graph.threads.net/v1.0/";

/// Largest page the listing endpoint hands out.
pub const MAX_PAGE_SIZE: usize = 100;

const SERVICE: &str = "Threads";

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One page of the listing endpoint. Each entry is decoded on its own so a single odd post
/// cannot sink the whole page.
#[derive(Debug)]
pub struct PostsPage {
    pub entries: Vec<Result<api::Post>>,
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct ThreadsClient {
    https_client: HttpsClient,
    base_url: Url,
    access_token: AccessToken,
    limiter: Arc<Limiter>,
    retry_policy: RetryPolicy,
}

impl ThreadsClient {
    pub fn new(access_token: &str) -> Result<Self> {
        Ok(Self {
            https_client: http::https_client(),
            base_url: Url::parse(THREADS_API_URL)?,
            access_token: AccessToken::new(access_token.to_string()),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(nonzero!(5u32)))),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url)?;
        Ok(self)
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidArgument(format!("bad base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn list_posts(
        &self,
        range: &DateRange,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<PostsPage> {
        let mut url = self.endpoint(&["me", "threads"])?;
        url.query_pairs_mut()
            .append_pair("fields", api::POST_FIELDS)
            .append_pair("since", &range.since.timestamp().to_string())
            .append_pair("until", &range.until.timestamp().to_string())
            .append_pair("limit", &page_size.min(MAX_PAGE_SIZE).to_string());
        if let Some(after) = after {
            url.query_pairs_mut().append_pair("after", after);
        }

        let resp = self.get("list posts", &url).await?;
        let resp: api::Response<Vec<Value>> = serde_json::from_slice(&resp.body)?;

        let entries = resp
            .data
            .into_iter()
            .map(|entry| {
                let id = entry.get("id").and_then(Value::as_str).map(str::to_string);
                serde_json::from_value::<api::Post>(entry)
                    .map_err(|err| SyncError::malformed(id.as_deref(), err.to_string()))
            })
            .collect();
        let next_cursor = resp.paging.and_then(|paging| paging.next_cursor());

        Ok(PostsPage {
            entries,
            next_cursor,
        })
    }

    /// A payload that does not decode is reported as [SyncError::MalformedRecord] for `media_id`.
    pub async fn post_insights(&self, media_id: &str) -> Result<Vec<api::Insight>> {
        let mut url = self.endpoint(&[media_id, "insights"])?;
        url.query_pairs_mut()
            .append_pair("metric", api::INSIGHT_METRICS);

        let resp = self.get("fetch insights", &url).await?;
        let resp: api::Response<Vec<api::Insight>> = serde_json::from_slice(&resp.body)
            .map_err(|err| SyncError::malformed(Some(media_id), err.to_string()))?;
        Ok(resp.data)
    }

    async fn get(&self, what: &str, url: &Url) -> Result<RawResponse> {
        self.retry_policy
            .run(what, || async {
                self.limiter.until_ready().await;

                // NB: the token goes on the wire only, never into the logged url
                let mut authed = url.clone();
                authed
                    .query_pairs_mut()
                    .append_pair("access_token", self.access_token.secret());
                debug!("GET {}", url.path());

                let req = Request::builder()
                    .method(Method::GET)
                    .uri(authed.as_str())
                    .body(Body::empty())?;
                let resp = http::send(&self.https_client, req).await?;
                if resp.status.is_success() {
                    Ok(resp)
                } else {
                    Err(classify(resp.status, resp.retry_after, &resp.body))
                }
            })
            .await
    }
}

/// Maps a non-2xx Graph API response onto the error taxonomy.
pub fn classify(status: StatusCode, retry_after: Option<Duration>, body: &[u8]) -> SyncError {
    let graph_error = serde_json::from_slice::<api::ErrorResponse>(body)
        .ok()
        .map(|resp| resp.error);
    let code = graph_error.as_ref().and_then(|err| err.code);
    let message = graph_error
        .map(|err| err.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    if status == StatusCode::UNAUTHORIZED || code == Some(190) {
        SyncError::Authentication(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS || matches!(code, Some(4 | 17 | 32 | 613)) {
        SyncError::RateLimit {
            service: SERVICE,
            retry_after,
        }
    } else if status.is_server_error() {
        SyncError::Network(format!("{SERVICE} returned {status}: {message}"))
    } else {
        SyncError::Api {
            service: SERVICE,
            status: status.as_u16(),
            message,
        }
    }
}
