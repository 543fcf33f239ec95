//! Hosted row-store backend.
//!
//! Talks to a PostgREST-style endpoint (`{url}/rest/v1/{table}`): the roster
//! is the `data` column of the row with `id = 1`, written with an upsert.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{migrations, RosterStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::roster::RosterSnapshot;

const BACKEND: &str = "hosted";

/// Id of the row holding the roster document.
const ROW_ID: u32 = 1;

/// Reads and writes the roster row over HTTP.
#[derive(Debug, Clone)]
pub struct HostedStore {
    client: Client,
    endpoint: String,
    key: String,
}

fn unavailable(err: &reqwest::Error) -> Error {
    Error::store_unavailable(BACKEND, err.to_string())
}

impl HostedStore {
    /// Create a store for `table` at the project `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the HTTP client cannot be built.
    pub fn new(url: &str, key: impl Into<String>, table: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| unavailable(&e))?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
            key: key.into(),
        })
    }

    /// Create a store from the `[hosted]` section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the url or key is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let hosted = &config.hosted;
        let (Some(url), Some(key)) = (hosted.url.as_deref(), hosted.key.as_deref()) else {
            return Err(Error::ConfigValidation {
                message: "hosted.url and hosted.key are required for the hosted store"
                    .to_string(),
            });
        };
        Self::new(url, key, &hosted.table, config.hosted_timeout())
    }

    /// The table endpoint requests go to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Only server errors, request timeouts and throttling count as
    /// unavailable. Other rejections are returned as [`Error::StoreRejected`].
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body = body.trim();
        let transient = status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS;
        if transient {
            Err(Error::store_unavailable(BACKEND, format!("HTTP {status}: {body}")))
        } else {
            Err(Error::StoreRejected {
                backend: BACKEND,
                status: status.as_u16(),
                message: body.to_string(),
            })
        }
    }
}

/// Decode the rows returned by a `select=data` query.
///
/// No rows means the roster has never been written. The column may hold a
/// JSON object or the same document as text.
pub(crate) fn decode_rows(rows: Value) -> Result<RosterSnapshot> {
    let Value::Array(rows) = rows else {
        return Err(Error::snapshot_format("expected an array of rows"));
    };
    let Some(mut row) = rows.into_iter().next() else {
        return Ok(RosterSnapshot::new());
    };
    match row.get_mut("data").map(Value::take) {
        Some(Value::String(text)) => migrations::decode_snapshot_str(&text),
        Some(data) => migrations::decode_snapshot(data),
        None => Err(Error::snapshot_format("roster row has no data column")),
    }
}

#[async_trait]
impl RosterStore for HostedStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn location(&self) -> String {
        self.endpoint.clone()
    }

    async fn load(&self) -> Result<RosterSnapshot> {
        let id_filter = format!("eq.{ROW_ID}");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id", id_filter.as_str()), ("select", "data")])
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| unavailable(&e))?;

        let rows: Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::snapshot_format(e.to_string()))?;
        debug!("Fetched roster row from {}", self.endpoint);
        decode_rows(rows)
    }

    async fn save(&self, snapshot: &RosterSnapshot) -> Result<()> {
        let body = json!([{ "id": ROW_ID, "data": serde_json::to_value(snapshot)? }]);
        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable(&e))?;

        Self::check(response).await?;
        info!("Saved roster to {}", self.endpoint);
        Ok(())
    }
}
