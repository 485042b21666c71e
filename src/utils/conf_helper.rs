use crate::models::dashboard_model::DashboardFile;
use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "dashboard.json";
const CONFIG_PATH_ENV: &str = "SENSOR_DASHBOARD_CONFIG";

static CONFIG_CACHE: OnceLock<DashboardFile> = OnceLock::new();

pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub async fn load_config(file_path: &str) -> Result<DashboardFile> {
    let data = fs::read_to_string(file_path)
        .await
        .with_context(|| format!("File read error: {file_path}"))?;

    let config: DashboardFile =
        serde_json::from_str(&data).with_context(|| format!("JSON parse error: {file_path}"))?;

    config
        .feed
        .validate()
        .with_context(|| format!("Invalid feed section in {file_path}"))?;
    Ok(config)
}

/// Loads the config once, binds the listener, and caches the config with
/// the port actually bound.
pub async fn init_config_and_bind() -> Result<TcpListener> {
    let file_path = config_path();
    let mut config = load_config(&file_path).await?;

    let bind_addr = format!("{}:{}", config.connection.ip, config.connection.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Bind failed: {bind_addr}"))?;

    let actual_port = listener.local_addr().context("Addr error")?.port();

    // port 0 means "pick one", record what we got
    config.connection.port = actual_port;

    CONFIG_CACHE
        .set(config)
        .map_err(|_| anyhow!("Config already initialized"))?;

    info!("Config loaded from {} with port {}", file_path, actual_port);

    Ok(listener)
}

pub fn get_cached_config() -> Option<&'static DashboardFile> {
    CONFIG_CACHE.get()
}
