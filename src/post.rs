use crate::error::{Result, SyncError};
use crate::threads_client::api;
use chrono::{DateTime, Utc};

/// Engagement counters for one post at the time of the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub views: u64,
    pub likes: u64,
    pub replies: u64,
    pub reposts: u64,
    pub quotes: u64,
    pub shares: u64,
}

impl Metrics {
    /// Reads the insight entries the API returned; anything it left out counts as 0.
    pub fn from_insights(post_id: &str, insights: &[api::Insight]) -> Result<Self> {
        let mut metrics = Self::default();
        for insight in insights {
            let value = insight
                .values
                .as_ref()
                .and_then(|values| values.first())
                .or(insight.total_value.as_ref())
                .map_or(0, |v| v.value);
            let value = u64::try_from(value).map_err(|_| {
                SyncError::malformed(
                    Some(post_id),
                    format!("negative `{}` value {value}", insight.name),
                )
            })?;

            match insight.name.as_str() {
                "views" => metrics.views = value,
                "likes" => metrics.likes = value,
                "replies" => metrics.replies = value,
                "reposts" => metrics.reposts = value,
                "quotes" => metrics.quotes = value,
                "shares" => metrics.shares = value,
                _ => (),
            }
        }
        Ok(metrics)
    }

    /// In sheet column order: views, likes, replies, reposts, quotes, shares.
    pub fn values(&self) -> [u64; 6] {
        [
            self.views,
            self.likes,
            self.replies,
            self.reposts,
            self.quotes,
            self.shares,
        ]
    }
}

/// A listing entry that passed validation but has no metrics yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostDraft {
    pub id: String,
    pub permalink: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub media_type: String,
}

impl PostDraft {
    pub fn is_repost_facade(&self) -> bool {
        self.media_type == api::REPOST_FACADE
    }

    pub fn with_metrics(self, metrics: Metrics) -> PostRecord {
        PostRecord {
            id: self.id,
            permalink: self.permalink,
            text: self.text,
            timestamp: self.timestamp,
            metrics,
        }
    }
}

impl TryFrom<api::Post> for PostDraft {
    type Error = SyncError;

    fn try_from(post: api::Post) -> Result<Self> {
        let id = post
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::malformed(None, "missing `id`"))?;
        let permalink = post
            .permalink
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SyncError::malformed(Some(&id), "missing `permalink`"))?;
        let timestamp = post
            .timestamp
            .as_deref()
            .ok_or_else(|| SyncError::malformed(Some(&id), "missing `timestamp`"))
            .and_then(|ts| {
                parse_timestamp(ts).map_err(|reason| SyncError::malformed(Some(&id), reason))
            })?;

        Ok(Self {
            id,
            permalink,
            text: post.text.unwrap_or_default(),
            timestamp,
            media_type: post.media_type.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostRecord {
    pub id: String,
    pub permalink: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: Metrics,
}

/// The API sends `2024-05-01T12:34:56+0000`; plain RFC 3339 is accepted too.
pub fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("unparseable timestamp `{s}`"))
}
