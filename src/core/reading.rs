// Data structures for sensor readings

use serde::Serialize;
use serde_json::Number;
use std::cmp::Ordering;
use std::fmt;

/// Opaque record identifier. Any JSON scalar is accepted; `1` and `"1"` are
/// distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ReadingId {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl fmt::Display for ReadingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingId::Text(s) => f.write_str(s),
            ReadingId::Number(n) => write!(f, "{}", n),
            ReadingId::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Timestamp {
    /// Seconds since the unix epoch.
    Epoch(f64),
    /// Source-provided text that did not parse as a number, e.g. `"12:30:45"`.
    Display(String),
    Unknown,
}

impl Timestamp {
    pub fn epoch(&self) -> Option<f64> {
        match self {
            Timestamp::Epoch(secs) => Some(*secs),
            _ => None,
        }
    }

    /// Ordering between two timestamps, only defined when both are epochs.
    pub fn cmp_epoch(&self, other: &Timestamp) -> Option<Ordering> {
        match (self.epoch(), other.epoch()) {
            (Some(a), Some(b)) => Some(a.total_cmp(&b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub id: Option<ReadingId>,
    pub timestamp: Timestamp,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub sensor: Option<String>,
    pub device: Option<String>,
}

impl Reading {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            id: None,
            timestamp,
            temperature: None,
            humidity: None,
            sensor: None,
            device: None,
        }
    }

    pub fn with_id(mut self, id: ReadingId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature = Some(celsius);
        self
    }

    pub fn with_humidity(mut self, percent: f64) -> Self {
        self.humidity = Some(percent);
        self
    }

    /// A reading carrying neither metric. Stored, but kept off the charts.
    pub fn is_heartbeat(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Humidity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_detection() {
        let beat = Reading::new(Timestamp::Unknown);
        assert!(beat.is_heartbeat());
        assert!(!beat.clone().with_humidity(0.0).is_heartbeat());
    }

    #[test]
    fn test_epoch_ordering_requires_both_numeric() {
        let a = Timestamp::Epoch(10.0);
        let b = Timestamp::Epoch(20.0);
        assert_eq!(a.cmp_epoch(&b), Some(Ordering::Less));
        assert_eq!(a.cmp_epoch(&Timestamp::Display("12:00".into())), None);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ReadingId::Number(Number::from(7)).to_string(), "7");
        assert_eq!(ReadingId::Text("a-1".into()).to_string(), "a-1");
    }
}
