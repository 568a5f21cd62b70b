//! Channel-manager API client.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::compress::CompressedRange;
use super::credentials;
use crate::error::SyncError;
use crate::model::RowKind;
use crate::storage::ChannelManagerConfig;

/// Compressed ranges of one row, tagged by row kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPayload {
    Availability(Vec<CompressedRange<u32>>),
    Rates(Vec<CompressedRange<f64>>),
}

#[derive(Serialize)]
struct RangesBody<'a, V> {
    ranges: &'a [CompressedRange<V>],
}

impl SyncPayload {
    pub fn kind(&self) -> RowKind {
        match self {
            SyncPayload::Availability(_) => RowKind::Availability,
            SyncPayload::Rates(_) => RowKind::Rate,
        }
    }

    /// Number of ranges carried.
    pub fn len(&self) -> usize {
        match self {
            SyncPayload::Availability(ranges) => ranges.len(),
            SyncPayload::Rates(ranges) => ranges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn path_segment(&self) -> &'static str {
        match self {
            SyncPayload::Availability(_) => "availability",
            SyncPayload::Rates(_) => "rates",
        }
    }

    /// JSON body: `{"ranges":[{"start":..,"end":..,"value":..}]}`.
    pub fn to_json(&self) -> Result<serde_json::Value, SyncError> {
        let body = match self {
            SyncPayload::Availability(ranges) => serde_json::to_value(RangesBody { ranges })?,
            SyncPayload::Rates(ranges) => serde_json::to_value(RangesBody { ranges })?,
        };
        Ok(body)
    }
}

/// Remote channel manager that accepts range updates.
#[async_trait]
pub trait ChannelManager: Send + Sync {
    /// Push the ranges of one row. `owner_external_id` is the channel id of
    /// the room type (availability) or rate plan (rates).
    async fn push_ranges(
        &self,
        property_external_id: &str,
        owner_external_id: &str,
        payload: &SyncPayload,
    ) -> Result<(), SyncError>;
}

/// HTTP channel manager using bearer authentication.
pub struct HttpChannelManager {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpChannelManager {
    /// # Errors
    /// Fails on an unparsable base URL or if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Build a client from configuration, reading the API key from the
    /// keyring or the configured environment variable.
    pub fn from_config(config: &ChannelManagerConfig) -> Result<Self, SyncError> {
        if config.base_url.trim().is_empty() {
            return Err(SyncError::NotConfigured(
                "channel_manager.base_url is empty".into(),
            ));
        }
        let api_key = credentials::api_key(&config.api_key_env)?;
        Self::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base_url}/properties/{property}/{availability|rates}/{owner}`.
    pub fn endpoint(
        &self,
        property_external_id: &str,
        owner_external_id: &str,
        payload: &SyncPayload,
    ) -> Result<Url, SyncError> {
        let url = format!(
            "{}/properties/{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(property_external_id),
            payload.path_segment(),
            urlencoding::encode(owner_external_id)
        );
        Ok(Url::parse(&url)?)
    }
}

#[async_trait]
impl ChannelManager for HttpChannelManager {
    async fn push_ranges(
        &self,
        property_external_id: &str,
        owner_external_id: &str,
        payload: &SyncPayload,
    ) -> Result<(), SyncError> {
        let url = self.endpoint(property_external_id, owner_external_id, payload)?;
        let body = payload.to_json()?;
        debug!(%url, ranges = payload.len(), "pushing ranges");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
