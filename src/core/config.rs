// Feed configuration

use crate::core::constants::*;
use crate::core::error::{FeedError, Result};
use chrono::{FixedOffset, Offset, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Extra places to look for the data file when the primary source fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FallbackSource {
    /// Plain GET, by default against the primary URL again.
    Direct {
        #[serde(default)]
        url: Option<String>,
    },
    /// Wraps the target in a CORS proxy: `endpoint?param=<encoded target>`,
    /// or `endpoint?<encoded target>` when no parameter name is given.
    Proxy {
        endpoint: String,
        #[serde(default)]
        param: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
    /// Alternate copy of the same document.
    Mirror { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedConfig {
    pub primary_url: String,
    pub fallback_urls: Vec<String>,
    pub fallbacks: Vec<FallbackSource>,
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    pub chart_window_size: usize,
    pub error_threshold: u32,
    pub page_size: usize,
    pub request_timeout_ms: u64,
    pub synthetic_fallback: bool,
    pub auto_start: bool,
    pub label_utc_offset_minutes: i32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            primary_url: String::new(),
            fallback_urls: Vec::new(),
            fallbacks: Vec::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            chart_window_size: DEFAULT_CHART_WINDOW,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            synthetic_fallback: true,
            auto_start: true,
            label_utc_offset_minutes: 0,
        }
    }
}

impl FeedConfig {
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            primary_url: primary_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        parse_url("primaryUrl", &self.primary_url)?;
        for url in &self.fallback_urls {
            parse_url("fallbackUrls", url)?;
        }
        for fallback in &self.fallbacks {
            match fallback {
                FallbackSource::Direct { url } => {
                    if let Some(url) = url {
                        parse_url("fallbacks.direct.url", url)?;
                    }
                }
                FallbackSource::Proxy { endpoint, url, .. } => {
                    parse_url("fallbacks.proxy.endpoint", endpoint)?;
                    if let Some(url) = url {
                        parse_url("fallbacks.proxy.url", url)?;
                    }
                }
                FallbackSource::Mirror { url } => {
                    parse_url("fallbacks.mirror.url", url)?;
                }
            }
        }

        let positive = [
            ("historyCapacity", self.history_capacity),
            ("chartWindowSize", self.chart_window_size),
            ("pageSize", self.page_size),
            ("errorThreshold", self.error_threshold as usize),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(FeedError::Config(format!("{} must be at least 1", name)));
        }

        if FixedOffset::east_opt(self.label_utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(FeedError::Config(format!(
                "labelUtcOffsetMinutes out of range: {}",
                self.label_utc_offset_minutes
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        clamp_interval(Duration::from_millis(self.poll_interval_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn label_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.label_utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Intervals below the floor would hammer the remote source.
pub fn clamp_interval(interval: Duration) -> Duration {
    interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS))
}

pub(crate) fn parse_url(field: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| FeedError::Config(format!("{}: invalid URL {:?}: {}", field, raw, e)))
}
