// Sensor feed refresh engine
// Main library entry point

pub mod core;

// Re-export main types
pub use self::core::config::{FallbackSource, FeedConfig};
pub use self::core::engine::{Command, Dashboard, DashboardHandle};
pub use self::core::error::{FeedError, Result};
pub use self::core::fetch::{Fetch, FetchResult, HttpFetcher};
pub use self::core::history::HistoryStore;
pub use self::core::reading::{Reading, ReadingId, Timestamp};
pub use self::core::scheduler::SchedulerState;
pub use self::core::validator::validate_payload;
pub use self::core::view::{ConnectionStatus, ViewUpdate};

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants() {
        use crate::core::constants::*;
        assert_eq!(DEFAULT_POLL_INTERVAL_MS, 2000);
        assert!(MIN_POLL_INTERVAL_MS <= DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(CACHE_BUST_PARAM, "t");
    }
}
