//! Error taxonomy shared by the gateway, router, stores, and scheduler.
//!
//! * **Capacity** failures (quota, rate limit, overload) are absorbed by the
//!   gateway's tier rotation and never reach a caller on their own.
//! * **Rejected** failures (policy, auth, malformed request) propagate so the
//!   caller can render a labeled message.
//! * Storage and I/O failures are logged by the stores and degraded to defaults.

use thiserror::Error;

/// Status/message fragments that mark a reasoning-service failure as a capacity problem.
const CAPACITY_MARKERS: &[&str] = &[
    "429",
    "503",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "resource exhausted",
    "resource_exhausted",
    "overloaded",
    "unavailable",
];

/// Failure reported by a reasoning-service call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("capacity exhausted on {model}: {message}")]
    Capacity { model: String, message: String },

    #[error("request rejected by {model}: {message}")]
    Rejected {
        model: String,
        status: Option<u16>,
        message: String,
    },

    #[error("transport failure talking to {model}: {message}")]
    Transport { model: String, message: String },

    #[error("malformed response from {model}: {message}")]
    Decode { model: String, message: String },
}

impl ServiceError {
    /// Builds the right variant from an HTTP status and/or error body.
    pub fn classify(model: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        if is_capacity_signal(status, &message) {
            ServiceError::Capacity {
                model: model.to_string(),
                message,
            }
        } else {
            ServiceError::Rejected {
                model: model.to_string(),
                status,
                message,
            }
        }
    }

    pub fn is_capacity(&self) -> bool {
        matches!(self, ServiceError::Capacity { .. })
    }
}

/// True when a status code or error text carries one of the capacity markers.
pub fn is_capacity_signal(status: Option<u16>, message: &str) -> bool {
    if matches!(status, Some(429) | Some(503)) {
        return true;
    }
    let lower = message.to_ascii_lowercase();
    CAPACITY_MARKERS.iter().any(|m| lower.contains(m))
}

/// Crate-level error for construction, storage, and configuration paths.
#[derive(Debug, Error)]
pub enum StewardError {
    #[error("reasoning service: {0}")]
    Service(#[from] ServiceError),

    #[error("storage: {0}")]
    Storage(#[from] sled::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),
}
