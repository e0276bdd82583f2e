//! Error types for Gridview

use thiserror::Error;

/// Core error type for Gridview operations
#[derive(Error, Debug)]
pub enum GridError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Fetch failed{}: {message}", status_suffix(.status))]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled")]
    Cancelled,
}

impl GridError {
    /// Build a fetch error without an HTTP status
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            status: None,
            message: message.into(),
        }
    }

    /// Status code carried by a fetch failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Result type alias for Gridview operations
pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_message_includes_status() {
        let err = GridError::Fetch {
            status: Some(503),
            message: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "Fetch failed (status 503): Service Unavailable");
        assert_eq!(err.status(), Some(503));

        let err = GridError::fetch("connection reset");
        assert_eq!(err.to_string(), "Fetch failed: connection reset");
        assert_eq!(err.status(), None);
    }
}
