use sensor_feed::FeedConfig;
use serde::{Deserialize, Serialize};

/// Contents of `dashboard.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardFile {
    pub name: String,
    pub connection: Connection,
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    pub port: u16,
}
