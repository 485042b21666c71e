// Fetch pipeline: ordered sources, cache-busting, JSON decode

use crate::core::config::{parse_url, FallbackSource, FeedConfig};
use crate::core::constants::CACHE_BUST_PARAM;
use crate::core::error::{FeedError, Result};
use chrono::Utc;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Url};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one fetch cycle. Failures are values, never panics.
pub type FetchResult = Result<Value>;

/// Anything that can produce one decoded payload per call.
pub trait Fetch: Send + Sync + 'static {
    fn fetch_once(&self) -> impl Future<Output = FetchResult> + Send;
}

impl<F: Fetch> Fetch for Arc<F> {
    fn fetch_once(&self) -> impl Future<Output = FetchResult> + Send {
        (**self).fetch_once()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceUrl {
    pub label: String,
    pub url: Url,
}

/// Primary first, then `fallbackUrls`, then typed `fallbacks`, each tried once.
/// Labels number the fallbacks by their position in the chain.
pub fn resolve_sources(config: &FeedConfig) -> Result<Vec<SourceUrl>> {
    let primary = parse_url("primaryUrl", &config.primary_url)?;
    let mut sources = vec![SourceUrl {
        label: "primary".to_string(),
        url: primary.clone(),
    }];

    for raw in &config.fallback_urls {
        sources.push(SourceUrl {
            label: format!("mirror#{}", sources.len()),
            url: parse_url("fallbackUrls", raw)?,
        });
    }

    for fallback in &config.fallbacks {
        let (kind, url) = match fallback {
            FallbackSource::Direct { url } => {
                let url = match url {
                    Some(raw) => parse_url("fallbacks.direct.url", raw)?,
                    None => primary.clone(),
                };
                ("direct", url)
            }
            FallbackSource::Proxy { endpoint, param, url } => {
                let target = match url {
                    Some(raw) => parse_url("fallbacks.proxy.url", raw)?,
                    None => primary.clone(),
                };
                let mut wrapped = parse_url("fallbacks.proxy.endpoint", endpoint)?;
                {
                    let mut pairs = wrapped.query_pairs_mut();
                    match param {
                        Some(name) => pairs.append_pair(name, target.as_str()),
                        None => pairs.append_key_only(target.as_str()),
                    };
                }
                ("proxy", wrapped)
            }
            FallbackSource::Mirror { url } => ("mirror", parse_url("fallbacks.mirror.url", url)?),
        };
        sources.push(SourceUrl {
            label: format!("{}#{}", kind, sources.len()),
            url,
        });
    }

    Ok(sources)
}

pub fn with_cache_buster(url: &Url, millis: i64) -> Url {
    let mut busted = url.clone();
    busted
        .query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &millis.to_string());
    busted
}

pub struct HttpFetcher {
    client: Client,
    sources: Vec<SourceUrl>,
}

impl HttpFetcher {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FeedError::Config(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            client,
            sources: resolve_sources(config)?,
        })
    }

    pub fn sources(&self) -> &[SourceUrl] {
        &self.sources
    }

    async fn try_source(&self, url: Url) -> FetchResult {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| {
                FeedError::network(e.status().map(|s| s.as_u16()), format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::network(
                Some(status.as_u16()),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            FeedError::network(Some(status.as_u16()), format!("body read failed: {}", e))
        })?;

        serde_json::from_slice(&body).map_err(|e| FeedError::Decode(e.to_string()))
    }
}

impl Fetch for HttpFetcher {
    fn fetch_once(&self) -> impl Future<Output = FetchResult> + Send {
        async move {
            let millis = Utc::now().timestamp_millis();
            let mut network_failure: Option<FeedError> = None;
            let mut decode_failure: Option<FeedError> = None;

            for source in &self.sources {
                let url = with_cache_buster(&source.url, millis);
                debug!("Fetching {} from {}", source.label, url);

                match self.try_source(url).await {
                    Ok(payload) => {
                        if network_failure.is_some() || decode_failure.is_some() {
                            debug!("Recovered via {}", source.label);
                        }
                        return Ok(payload);
                    }
                    Err(e) => {
                        warn!("Source {} failed: {}", source.label, e);
                        match e {
                            FeedError::Decode(_) => decode_failure = Some(e),
                            other => network_failure = Some(other),
                        }
                    }
                }
            }

            // A reachable source serving bad JSON says more than a dead mirror.
            if let Some(FeedError::Decode(msg)) = decode_failure {
                return Err(FeedError::Decode(msg));
            }
            let attempted = self.sources.len();
            Err(match network_failure {
                Some(FeedError::Network { status, message }) => FeedError::network(
                    status,
                    format!("all {} sources failed, last: {}", attempted, message),
                ),
                Some(other) => other,
                None => FeedError::network(None, "no sources configured"),
            })
        }
    }
}
