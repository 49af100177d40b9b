pub mod api;
pub mod auth;
mod worksheet;

pub use worksheet::GoogleWorksheet;

use crate::error::{Result, SyncError};
use crate::http::{self, HttpsClient, RawResponse};
use crate::retry::RetryPolicy;
use auth::ServiceAccountKey;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Method, Request, StatusCode};
use oauth2::AccessToken;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/";

/// Values are parsed as if typed into the UI, so dates and numbers keep their types.
pub const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

const SERVICE: &str = "Google Sheets";

#[derive(Clone, Debug)]
pub struct SheetsClient {
    https_client: HttpsClient,
    base_url: Url,
    access_token: AccessToken,
    retry_policy: RetryPolicy,
}

impl SheetsClient {
    /// Trades the service account key for an access token.
    pub async fn authorize(key: &ServiceAccountKey, retry_policy: RetryPolicy) -> Result<Self> {
        let https_client = http::https_client();
        let access_token = auth::fetch_token(&https_client, key, &retry_policy).await?;
        Ok(Self {
            https_client,
            base_url: Url::parse(SHEETS_API_URL)?,
            access_token,
            retry_policy,
        })
    }

    pub fn with_access_token(access_token: &str) -> Result<Self> {
        Ok(Self {
            https_client: http::https_client(),
            base_url: Url::parse(SHEETS_API_URL)?,
            access_token: AccessToken::new(access_token.to_string()),
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

    /// Resolves `title` within the spreadsheet; see [GoogleWorksheet::open].
    pub async fn worksheet(&self, spreadsheet_id: &str, title: &str) -> Result<GoogleWorksheet> {
        GoogleWorksheet::open(self.clone(), spreadsheet_id, title).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidArgument(format!("bad base url {}", self.base_url)))?
            .pop_if_empty()
            .push("spreadsheets")
            .extend(segments);
        Ok(url)
    }

    /// Sheet titles and conditional formats, nothing else.
    pub async fn spreadsheet(&self, spreadsheet_id: &str) -> Result<api::Spreadsheet> {
        let mut url = self.endpoint(&[spreadsheet_id])?;
        url.query_pairs_mut().append_pair(
            "fields",
            "sheets(properties(sheetId,title),conditionalFormats)",
        );
        let resp = self.send("read spreadsheet metadata", Method::GET, &url, None).await?;
        Ok(serde_json::from_slice(&resp.body)?)
    }

    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<Value>>> {
        let mut url = self.endpoint(&[spreadsheet_id, "values", range])?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        let resp = self.send("read values", Method::GET, &url, None).await?;
        let resp: api::ValueRange = serde_json::from_slice(&resp.body)?;
        Ok(resp.values)
    }

    pub async fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<api::ValueRange>,
    ) -> Result<()> {
        let url = self.endpoint(&[spreadsheet_id, "values:batchUpdate"])?;
        let body = api::BatchUpdateValuesRequest {
            value_input_option: VALUE_INPUT_OPTION.to_string(),
            data,
        };
        self.send("update values", Method::POST, &url, Some(json_body(&body)?))
            .await?;
        Ok(())
    }

    pub async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<api::Request>) -> Result<()> {
        let url = self.endpoint(&[&format!("{spreadsheet_id}:batchUpdate")])?;
        let body = json_body(&api::BatchUpdateRequest { requests })?;
        // NB: addConditionalFormatRule is not idempotent
        self.retry_policy
            .run_unreplayable("apply formatting", || {
                self.attempt(&Method::POST, &url, Some(body.as_slice()))
            })
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        what: &str,
        method: Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse> {
        self.retry_policy
            .run(what, || self.attempt(&method, url, body.as_deref()))
            .await
    }

    async fn attempt(&self, method: &Method, url: &Url, body: Option<&[u8]>) -> Result<RawResponse> {
        debug!("{} {}", method, url.path());
        let req = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.access_token.secret()),
            )
            .header(CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_vec())))?;
        let resp = http::send(&self.https_client, req).await?;
        if resp.status.is_success() {
            Ok(resp)
        } else {
            Err(classify(resp.status, resp.retry_after, &resp.body))
        }
    }
}

fn json_body<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}

/// Maps a non-2xx Sheets API response onto the error taxonomy.
pub fn classify(status: StatusCode, retry_after: Option<Duration>, body: &[u8]) -> SyncError {
    let message = serde_json::from_slice::<api::ErrorResponse>(body)
        .map(|resp| resp.error.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => SyncError::RateLimit {
            service: SERVICE,
            retry_after,
        },
        status if status.is_server_error() => {
            SyncError::Network(format!("{SERVICE} returned {status}: {message}"))
        }
        status => SyncError::Api {
            service: SERVICE,
            status: status.as_u16(),
            message,
        },
    }
}

/// `'It''s mine'!A2:K2`
pub fn a1_range(title: &str, cells: Option<&str>) -> String {
    let quoted = format!("'{}'", title.replace('\'', "''"));
    match cells {
        Some(cells) => format!("{quoted}!{cells}"),
        None => quoted,
    }
}
