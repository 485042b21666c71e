// Error handling for the sensor feed

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Payload shape error: {0}")]
    Shape(String),

    #[error("Network error: {message}")]
    Network { status: Option<u16>, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Dashboard engine is no longer running")]
    EngineClosed,
}

impl FeedError {
    pub fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        FeedError::Network {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by a network failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FeedError::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Short machine-friendly tag, published as `lastErrorKind`.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Shape(_) => "shape",
            FeedError::Network { .. } => "network",
            FeedError::Decode(_) => "decode",
            FeedError::Config(_) => "config",
            FeedError::EngineClosed => "closed",
        }
    }
}
