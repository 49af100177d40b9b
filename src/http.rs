use crate::error::Result;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{HeaderMap, RETRY_AFTER};
use hyper::{Body, Client, Request, StatusCode};
use hyper_tls::HttpsConnector;
use std::time::Duration;

pub type HttpsClient = Client<HttpsConnector<HttpConnector>>;

pub fn https_client() -> HttpsClient {
    let https = HttpsConnector::new();
    Client::builder().build::<_, hyper::Body>(https)
}

#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub retry_after: Option<Duration>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends `req` and buffers the whole body; transport failures come back as
/// [crate::error::SyncError::Network].
pub async fn send(client: &HttpsClient, req: Request<Body>) -> Result<RawResponse> {
    let resp = client.request(req).await?;
    let status = resp.status();
    let retry_after = retry_after(resp.headers());
    let body = hyper::body::to_bytes(resp.into_body()).await?;
    Ok(RawResponse {
        status,
        retry_after,
        body,
    })
}

/// Only the delay-seconds form; HTTP dates are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
