//! Error types for the query-context coordinator.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::Dimension;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors raised by store transitions and configuration.
///
/// Every variant is a caller or configuration mistake. None of them is
/// produced by network activity; see [`FetchError`] for that.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A preset id string did not name a known preset, or the preset is not
    /// offered by the configured preset table.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// A dimension key string did not name a known dimension.
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    /// The time range bounds are not strictly ordered.
    #[error("invalid time range: start={start}, end={end}")]
    InvalidTimeRange {
        /// Start instant.
        start: DateTime<Utc>,
        /// End instant.
        end: DateTime<Utc>,
    },

    /// The zoom bounds are inverted.
    #[error("invalid zoom range: min={min}, max={max}")]
    InvalidZoom {
        /// Lower bound.
        min: DateTime<Utc>,
        /// Upper bound.
        max: DateTime<Utc>,
    },

    /// `drill_up` was asked to go below the current level.
    #[error("cannot drill up to level {requested}: current level is {current}")]
    InvalidDrillLevel {
        /// Requested level.
        requested: usize,
        /// Current drill-down level.
        current: usize,
    },

    /// Drill-down was given an empty value.
    #[error("empty drill-down value for dimension {dimension}")]
    EmptyDrillValue {
        /// Target dimension.
        dimension: Dimension,
    },

    /// The drill hierarchy has no level below the current one.
    #[error("drill-down hierarchy exhausted at level {level}")]
    DrillDepthExceeded {
        /// Current drill-down level.
        level: usize,
    },

    /// The aggregation endpoint cannot group by this dimension.
    #[error("cannot group by dimension: {0}")]
    UnsupportedGroupBy(Dimension),

    /// A widget id was not registered with the dashboard.
    #[error("unknown widget: {0}")]
    UnknownWidget(String),

    /// A widget id was registered twice.
    #[error("widget already registered: {0}")]
    DuplicateWidget(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
}

/// Errors from a single widget's data fetch.
///
/// These stay local to the widget that issued the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or did not complete.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Body or reason phrase.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
