// Placeholder samples shown while the source is down

use crate::core::constants::*;
use crate::core::history::HistoryStore;
use crate::core::reading::{Reading, Timestamp};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// A fabricated reading. Deliberately not a `Reading`, so it cannot be
/// appended to history by accident.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticSample {
    pub label: &'static str,
    pub reading: Reading,
}

/// Jitters around the last real values when there are any, otherwise around
/// fixed room-climate defaults. Tags follow the last real reading.
pub fn synthesize<R: Rng>(
    rng: &mut R,
    history: &HistoryStore,
    now: DateTime<Utc>,
) -> SyntheticSample {
    let last = history.latest();
    let base_temp = history
        .all()
        .rev()
        .find_map(|r| r.temperature)
        .unwrap_or(SYNTHETIC_BASE_TEMPERATURE);
    let base_hum = history
        .all()
        .rev()
        .find_map(|r| r.humidity)
        .unwrap_or(SYNTHETIC_BASE_HUMIDITY);

    let mut reading = Reading::new(Timestamp::Epoch(now.timestamp() as f64))
        .with_temperature(base_temp + rng.gen_range(0.0..SYNTHETIC_TEMPERATURE_JITTER))
        .with_humidity(base_hum + rng.gen_range(0.0..SYNTHETIC_HUMIDITY_JITTER));
    reading.sensor = Some(
        last.and_then(|r| r.sensor.clone())
            .unwrap_or_else(|| SYNTHETIC_SENSOR.to_string()),
    );
    reading.device = Some(
        last.and_then(|r| r.device.clone())
            .unwrap_or_else(|| SYNTHETIC_DEVICE.to_string()),
    );

    SyntheticSample {
        label: SYNTHETIC_LABEL,
        reading,
    }
}
