use crate::error::{Result, SyncError};
use crate::http::{self, HttpsClient};
use crate::retry::RetryPolicy;
use crate::sheets_client::api;
use chrono::{DateTime, Duration, Utc};
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, StatusCode};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oauth2::basic::BasicTokenResponse;
use oauth2::{AccessToken, TokenResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertions may live at most an hour.
const ASSERTION_LIFETIME_MINUTES: i64 = 60;

/// The fields of a downloaded service account key file that matter here.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SyncError::Credentials(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| SyncError::Credentials(format!("not a service account key: {err}")))
    }

    pub fn claims(&self, now: DateTime<Utc>) -> Claims {
        Claims {
            iss: self.client_email.clone(),
            scope: SPREADSHEETS_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
        }
    }

    /// RS256-signed JWT to trade for an access token.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &self.claims(now),
            &key,
        )?)
    }
}

/// Runs the JWT bearer grant against the key's token endpoint.
pub async fn fetch_token(
    https_client: &HttpsClient,
    key: &ServiceAccountKey,
    retry_policy: &RetryPolicy,
) -> Result<AccessToken> {
    let assertion = key.assertion(Utc::now())?;
    let form = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", JWT_BEARER_GRANT)
        .append_pair("assertion", &assertion)
        .finish();

    let resp = retry_policy
        .run("fetch Google access token", || async {
            let req = Request::builder()
                .method(Method::POST)
                .uri(key.token_uri.as_str())
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.clone()))?;
            let resp = http::send(https_client, req).await?;

            if resp.status.is_success() {
                Ok(resp)
            } else if resp.status == StatusCode::TOO_MANY_REQUESTS {
                Err(SyncError::RateLimit {
                    service: "Google OAuth",
                    retry_after: resp.retry_after,
                })
            } else if resp.status.is_server_error() {
                Err(SyncError::Network(format!(
                    "token endpoint returned {}",
                    resp.status
                )))
            } else {
                let message = serde_json::from_slice::<api::TokenError>(&resp.body)
                    .map(|err| match err.error_description {
                        Some(description) => format!("{}: {description}", err.error),
                        None => err.error,
                    })
                    .unwrap_or_else(|_| resp.body_text());
                Err(SyncError::Authentication(message))
            }
        })
        .await?;

    let token: BasicTokenResponse = serde_json::from_slice(&resp.body)?;
    info!("Authorized as {}", key.client_email);
    Ok(token.access_token().clone())
}
