use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;
use crate::sheets_client::SHEETS_API_URL;
use crate::threads_client::THREADS_API_URL;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_TOPICS: [&str; 2] = ["AI", "Storytelling"];

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Sync Threads post metrics into a Google Sheets worksheet."
)]
pub struct Args {
    /// Threads API access token
    #[arg(long, env = "THREADS_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Path to a Google service account key (JSON)
    #[arg(long, env = "GOOGLE_CREDS_JSON")]
    pub creds_json: PathBuf,

    /// Google spreadsheet id
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: String,

    /// Worksheet (tab) title
    #[arg(long, env = "WORKSHEET")]
    pub worksheet: String,

    /// Start of the range, inclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long, env = "SYNC_SINCE")]
    pub since: String,

    /// End of the range, exclusive (YYYY-MM-DD or RFC 3339); defaults to now
    #[arg(long, env = "SYNC_UNTIL")]
    pub until: Option<String>,

    /// Max posts to fetch
    #[arg(long, env = "SYNC_LIMIT", default_value_t = 100)]
    pub limit: usize,

    /// IANA time zone the Date column is rendered in
    #[arg(long, env = "SYNC_TIMEZONE", default_value = "Asia/Seoul")]
    pub timezone: String,

    /// Choices for the Topic dropdown (repeatable)
    #[arg(long = "topic", env = "SYNC_TOPICS", value_delimiter = ',')]
    pub topics: Vec<String>,

    /// How many times a throttled or failed request is retried
    #[arg(long, env = "SYNC_MAX_RETRIES", default_value_t = 4)]
    pub max_retries: u32,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, env = "SYNC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "THREADS_API_URL", default_value = THREADS_API_URL, hide = true)]
    pub threads_api_url: String,

    #[arg(long, env = "SHEETS_API_URL", default_value = SHEETS_API_URL, hide = true)]
    pub sheets_api_url: String,
}

/// Half-open `[since, until)` window of post timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl DateRange {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if since >= until {
            return Err(SyncError::InvalidArgument(format!(
                "`since` ({since}) must be before `until` ({until})"
            )));
        }
        Ok(Self { since, until })
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.since <= *timestamp && *timestamp < self.until
    }
}

#[derive(Debug, Clone)]
pub struct RunParameters {
    pub access_token: String,
    pub creds_json: PathBuf,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub range: DateRange,
    pub limit: usize,
    pub timezone: Tz,
    pub topics: Vec<String>,
    pub retry_policy: RetryPolicy,
    pub threads_api_url: String,
    pub sheets_api_url: String,
}

impl RunParameters {
    pub fn from_args(args: Args, now: DateTime<Utc>) -> Result<Self> {
        let since = parse_bound(&args.since)?;
        let until = match &args.until {
            Some(until) => parse_bound(until)?,
            None => now,
        };
        if args.limit == 0 {
            return Err(SyncError::InvalidArgument(
                "`limit` must be at least 1".to_string(),
            ));
        }

        let topics = if args.topics.is_empty() {
            DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect()
        } else {
            args.topics
        };

        Ok(Self {
            access_token: args.access_token,
            creds_json: args.creds_json,
            spreadsheet_id: args.spreadsheet_id,
            worksheet: args.worksheet,
            range: DateRange::new(since, until)?,
            limit: args.limit,
            timezone: parse_timezone(&args.timezone)?,
            topics,
            retry_policy: RetryPolicy::new(args.max_retries),
            threads_api_url: args.threads_api_url,
            sheets_api_url: args.sheets_api_url,
        })
    }
}

/// Accepts a bare date (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_bound(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| SyncError::InvalidArgument(format!("invalid date `{s}`")))?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            SyncError::InvalidArgument(format!(
                "`{s}` is neither YYYY-MM-DD nor an RFC 3339 timestamp"
            ))
        })
}

/// Names from the tz database, e.g. `Asia/Seoul` or `UTC`.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>()
        .map_err(|err| SyncError::InvalidArgument(format!("unknown time zone `{s}`: {err}")))
}
