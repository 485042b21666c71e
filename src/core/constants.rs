// Defaults and fixed values for the sensor feed

// Polling
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ERROR_THRESHOLD: u32 = 3;

// Query parameter carrying the current time in ms, defeats CDN caching
pub const CACHE_BUST_PARAM: &str = "t";

// History / views
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
/// Ids remembered per history slot, so re-fetched evicted readings stay duplicates.
pub const SEEN_IDS_PER_SLOT: usize = 4;
pub const DEFAULT_CHART_WINDOW: usize = 20;
pub const DEFAULT_PAGE_SIZE: usize = 10;

// |current - previous| must exceed this to count as a trend
pub const TREND_DEADBAND: f64 = 0.1;

// Display placeholders
pub const ABSENT_VALUE: &str = "--";
pub const TIME_PLACEHOLDER: &str = "--:--";
pub const DATE_PLACEHOLDER: &str = "--/--/--";

// Time-ago buckets, in seconds
pub const SECS_PER_MINUTE: i64 = 60;
pub const SECS_PER_HOUR: i64 = 3_600;
pub const SECS_PER_DAY: i64 = 86_400;

// Synthetic sample generation
pub const SYNTHETIC_BASE_TEMPERATURE: f64 = 24.5;
pub const SYNTHETIC_BASE_HUMIDITY: f64 = 55.0;
pub const SYNTHETIC_TEMPERATURE_JITTER: f64 = 2.0;
pub const SYNTHETIC_HUMIDITY_JITTER: f64 = 5.0;
pub const SYNTHETIC_SENSOR: &str = "AHT20";
pub const SYNTHETIC_DEVICE: &str = "ESP32";
pub const SYNTHETIC_LABEL: &str = "synthetic sample (source unreachable)";
