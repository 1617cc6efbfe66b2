//! Authenticated read of an activity's splits.

use crate::capture::CapturedSession;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use swimsplit_common::RawLap;
use thiserror::Error;
use tracing::{error, info};

pub const CONNECT_BASE_URL: &str = "https://connect.garmin.com";

/// Sent by both the browser and the fetcher so the session looks consistent.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const ERROR_BODY_LIMIT: usize = 500;

const STATIC_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json, text/javascript, */*; q=0.01"),
    ("accept-language", "en-US,en;q=0.5"),
    ("x-requested-with", "XMLHttpRequest"),
    ("nk", "NT"),
    ("di-backend", "connectapi.garmin.com"),
    ("x-app-ver", "5.11.3.3"),
    ("x-lang", "en-US"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to fetch splits: {status} ({body})")]
    Status { status: u16, body: String },
    #[error("Invalid header value for {0}")]
    InvalidHeader(String),
    #[error("Failed to parse splits response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Body of the splits endpoint. Only the laps are used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivitySplits {
    #[serde(default, rename = "lapDTOs")]
    pub lap_dtos: Option<Vec<RawLap>>,
}

impl ActivitySplits {
    pub fn laps(&self) -> &[RawLap] {
        self.lap_dtos.as_deref().unwrap_or_default()
    }

    /// Calendar date (`YYYY-MM-DD`) of the first lap's start, or today (UTC)
    /// when the platform did not send one.
    pub fn date_key(&self) -> String {
        self.laps()
            .first()
            .and_then(|lap| lap.start_time_gmt.as_deref())
            .and_then(parse_start_date)
            .unwrap_or_else(|| Utc::now().date_naive().format("%Y-%m-%d").to_string())
    }
}

fn parse_start_date(text: &str) -> Option<String> {
    let text = text.trim();
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })?;
    Some(naive.date().format("%Y-%m-%d").to_string())
}

#[async_trait]
pub trait SplitsSource: Send + Sync {
    async fn fetch_splits(
        &self,
        session: &CapturedSession,
        activity_id: &str,
    ) -> Result<ActivitySplits, FetchError>;
}

pub fn splits_url(base_url: &str, activity_id: &str, timestamp_ms: i64) -> String {
    format!(
        "{}/activity-service/activity/{}/splits?_={}",
        base_url.trim_end_matches('/'),
        activity_id,
        timestamp_ms
    )
}

/// Header set the web app sends with its own splits request.
pub fn request_headers(
    session: &CapturedSession,
    activity_id: &str,
) -> Result<HeaderMap, FetchError> {
    let referer = format!("{}/modern/activity/{}", CONNECT_BASE_URL, activity_id);
    let dynamic = [
        ("authorization", session.authorization.as_str()),
        ("cookie", session.cookie.as_str()),
        ("user-agent", USER_AGENT),
        ("referer", referer.as_str()),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in dynamic {
        insert_header(&mut headers, name, value)?;
    }
    for &(name, value) in STATIC_HEADERS {
        insert_header(&mut headers, name, value)?;
    }
    Ok(headers)
}

fn insert_header(
    headers: &mut HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), FetchError> {
    let value =
        HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.to_string()))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

pub struct SplitsClient {
    http: reqwest::Client,
    base_url: String,
}

impl SplitsClient {
    pub fn new() -> Self {
        Self::with_base_url(CONNECT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for SplitsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SplitsSource for SplitsClient {
    async fn fetch_splits(
        &self,
        session: &CapturedSession,
        activity_id: &str,
    ) -> Result<ActivitySplits, FetchError> {
        let url = splits_url(&self.base_url, activity_id, Utc::now().timestamp_millis());
        info!("Fetching splits from: {}", url);

        let response = self
            .http
            .get(&url)
            .headers(request_headers(session, activity_id)?)
            .send()
            .await?;
        let status = response.status();
        info!("Fetch status: {}", status);

        let text = response.text().await?;
        if !status.is_success() {
            let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            error!("Split fetch failed: {} for {}", status, url);
            error!("Response Text: {}...", body);
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
