// Derived views over the history store
//
// Everything here is a pure function of a store snapshot (plus `now` and a
// label offset where time is rendered), so the presentation side can be
// rebuilt from scratch on every cycle.

use crate::core::constants::*;
use crate::core::history::HistoryStore;
use crate::core::reading::{Metric, Reading, Timestamp};
use crate::core::scheduler::{Scheduler, SchedulerState};
use crate::core::synthetic::SyntheticSample;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Error,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

/// Deadband classification; jitter within ±0.1 stays flat.
pub fn classify_trend(delta: f64) -> Trend {
    if delta > TREND_DEADBAND {
        Trend::Rising
    } else if delta < -TREND_DEADBAND {
        Trend::Falling
    } else {
        Trend::Flat
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub value: Option<f64>,
    pub display: String,
    pub delta: Option<f64>,
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSnapshot {
    pub reading: Option<Reading>,
    pub temperature: MetricSnapshot,
    pub humidity: MetricSnapshot,
}

pub fn latest_snapshot(store: &HistoryStore) -> LatestSnapshot {
    LatestSnapshot {
        reading: store.latest().cloned(),
        temperature: metric_snapshot(store, Metric::Temperature),
        humidity: metric_snapshot(store, Metric::Humidity),
    }
}

fn metric_snapshot(store: &HistoryStore, metric: Metric) -> MetricSnapshot {
    let value = store.latest().and_then(|r| r.metric(metric));
    let previous = store.all().rev().skip(1).find_map(|r| r.metric(metric));
    let delta = value.zip(previous).map(|(current, prev)| current - prev);
    MetricSnapshot {
        value,
        display: format_metric(value),
        delta,
        trend: delta.map(classify_trend),
    }
}

pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => ABSENT_VALUE.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
}

/// Last `window` non-heartbeat readings as parallel arrays. Missing metrics
/// plot as zero to keep the line continuous.
pub fn chart_series(store: &HistoryStore, window: usize, offset: FixedOffset) -> ChartSeries {
    let plotted: Vec<&Reading> = store.all().filter(|r| !r.is_heartbeat()).collect();
    let start = plotted.len().saturating_sub(window);

    let mut series = ChartSeries::default();
    for reading in &plotted[start..] {
        series.labels.push(time_label(&reading.timestamp, offset));
        series.temperature.push(reading.temperature.unwrap_or(0.0));
        series.humidity.push(reading.humidity.unwrap_or(0.0));
    }
    series
}

/// `None` for epochs outside what a calendar date can represent.
fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    let floor = secs.floor();
    if !(i64::MIN as f64..i64::MAX as f64).contains(&floor) {
        return None;
    }
    DateTime::from_timestamp(floor as i64, 0)
}

fn epoch_to_datetime(secs: f64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    epoch_to_utc(secs).map(|dt| dt.with_timezone(&offset))
}

/// `HH:MM` for epochs, the first two `:` parts of display text, else a placeholder.
pub fn time_label(timestamp: &Timestamp, offset: FixedOffset) -> String {
    match timestamp {
        Timestamp::Epoch(secs) => epoch_to_datetime(*secs, offset)
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_else(|| TIME_PLACEHOLDER.to_string()),
        Timestamp::Display(text) => text.split(':').take(2).collect::<Vec<_>>().join(":"),
        Timestamp::Unknown => TIME_PLACEHOLDER.to_string(),
    }
}

pub fn date_label(timestamp: &Timestamp, offset: FixedOffset) -> String {
    timestamp
        .epoch()
        .and_then(|secs| epoch_to_datetime(secs, offset))
        .map(|dt| dt.format("%Y/%m/%d").to_string())
        .unwrap_or_else(|| DATE_PLACEHOLDER.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAgo {
    JustNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
    Unknown,
}

impl fmt::Display for TimeAgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn unit(f: &mut fmt::Formatter<'_>, n: i64, name: &str) -> fmt::Result {
            let plural = if n == 1 { "" } else { "s" };
            write!(f, "{} {}{} ago", n, name, plural)
        }
        match self {
            TimeAgo::JustNow => f.write_str("just now"),
            TimeAgo::Minutes(n) => unit(f, *n, "minute"),
            TimeAgo::Hours(n) => unit(f, *n, "hour"),
            TimeAgo::Days(n) => unit(f, *n, "day"),
            TimeAgo::Unknown => f.write_str(ABSENT_VALUE),
        }
    }
}

/// Future timestamps (clock skew on the device) read as "just now".
/// Epochs no calendar can hold are unknown.
pub fn time_ago(reading: &Reading, now: DateTime<Utc>) -> TimeAgo {
    let Some(then) = reading.timestamp.epoch().and_then(epoch_to_utc) else {
        return TimeAgo::Unknown;
    };
    let elapsed = now.timestamp().saturating_sub(then.timestamp());
    if elapsed < SECS_PER_MINUTE {
        TimeAgo::JustNow
    } else if elapsed < SECS_PER_HOUR {
        TimeAgo::Minutes(elapsed / SECS_PER_MINUTE)
    } else if elapsed < SECS_PER_DAY {
        TimeAgo::Hours(elapsed / SECS_PER_HOUR)
    } else {
        TimeAgo::Days(elapsed / SECS_PER_DAY)
    }
}

pub fn time_ago_label(reading: &Reading, now: DateTime<Utc>) -> String {
    time_ago(reading, now).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub id: String,
    pub date: String,
    pub time: String,
    pub temperature: String,
    pub humidity: String,
    pub time_ago: String,
}

impl TableRow {
    fn render(reading: &Reading, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            id: reading
                .id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| ABSENT_VALUE.to_string()),
            date: date_label(&reading.timestamp, offset),
            time: time_label(&reading.timestamp, offset),
            temperature: format_metric(reading.temperature),
            humidity: format_metric(reading.humidity),
            time_ago: time_ago_label(reading, now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage {
    pub rows: Vec<TableRow>,
    pub page_index: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub total: usize,
}

/// Newest first. An empty store still has one (empty) page.
pub fn table_page(
    store: &HistoryStore,
    page_size: usize,
    page_index: usize,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> TablePage {
    let page_size = page_size.max(1);
    let total = store.len();
    let page_count = total.div_ceil(page_size).max(1);
    let page_index = page_index.min(page_count - 1);

    let rows = store
        .all()
        .rev()
        .skip(page_index * page_size)
        .take(page_size)
        .map(|r| TableRow::render(r, now, offset))
        .collect();

    TablePage {
        rows,
        page_index,
        page_count,
        page_size,
        total,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounters {
    pub requests: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub retained: usize,
    pub capacity: usize,
    pub total_received: u64,
    pub error_streak: u32,
    pub error_threshold: u32,
    pub request_count: u64,
    pub error_total: u64,
    pub uptime_secs: u64,
    pub uptime: String,
}

pub fn stats(
    store: &HistoryStore,
    scheduler: &Scheduler,
    counters: CycleCounters,
    uptime: Duration,
) -> Stats {
    Stats {
        retained: store.len(),
        capacity: store.capacity(),
        total_received: store.received_total(),
        error_streak: scheduler.failure_streak(),
        error_threshold: scheduler.threshold(),
        request_count: counters.requests,
        error_total: counters.errors,
        uptime_secs: uptime.as_secs(),
        uptime: format_uptime(uptime),
    }
}

pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Everything the presentation side needs for one refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewUpdate {
    pub status: ConnectionStatus,
    pub scheduler: SchedulerState,
    pub latest: LatestSnapshot,
    pub chart: ChartSeries,
    pub table: TablePage,
    pub stats: Stats,
    pub last_error: Option<String>,
    /// `FeedError::kind` of the last failure: shape, network, decode.
    pub last_error_kind: Option<&'static str>,
    /// Present only while the source is considered down. Never part of history.
    pub synthetic: Option<SyntheticSample>,
    pub generated_at: DateTime<Utc>,
}
