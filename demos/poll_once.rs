// Fetch the feed once and print every derived view

use sensor_feed::core::view;
use sensor_feed::{validate_payload, Fetch, FeedConfig, HistoryStore, HttpFetcher, Result};
use chrono::Utc;
use tracing::{debug, info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000/data/sensor-data.json".to_string());
    let config = FeedConfig::new(url);
    config.validate()?;

    let fetcher = HttpFetcher::new(&config)?;
    for source in fetcher.sources() {
        debug!("  {} -> {}", source.label, source.url);
    }

    let payload = fetcher.fetch_once().await?;
    let batch = validate_payload(&payload)?;
    info!("Received {} readings", batch.len());

    let mut store = HistoryStore::new(config.history_capacity);
    let inserted = store.append(batch);
    info!("Stored {} new readings", inserted);

    let latest = view::latest_snapshot(&store);
    info!(
        "Latest: temperature={} humidity={}",
        latest.temperature.display, latest.humidity.display
    );

    let offset = config.label_offset();
    let chart = view::chart_series(&store, config.chart_window_size, offset);
    for (i, label) in chart.labels.iter().enumerate() {
        debug!("  {} {:>6.1} {:>6.1}", label, chart.temperature[i], chart.humidity[i]);
    }

    let page = view::table_page(&store, config.page_size, 0, Utc::now(), offset);
    info!("Table page 1/{} ({} rows total):", page.page_count, page.total);
    for row in &page.rows {
        info!(
            "  #{} {} {} {}°C {}% ({})",
            row.id, row.date, row.time, row.temperature, row.humidity, row.time_ago
        );
    }

    Ok(())
}
