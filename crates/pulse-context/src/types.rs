//! Shared vocabulary: filter dimensions, aggregation functions and
//! time-series bucket intervals.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// One categorical axis of filtering.
///
/// The set is fixed at compile time. Declaration order is the canonical
/// order used for iteration, query strings and query keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Service name, e.g. `checkout-api`.
    Service,
    /// Endpoint path.
    Endpoint,
    /// Deployment region.
    Region,
    /// Environment, e.g. `production`.
    Environment,
    /// Metric name, e.g. `latency`.
    MetricName,
    /// Request status.
    Status,
}

impl Dimension {
    /// Every dimension in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Service,
        Self::Endpoint,
        Self::Region,
        Self::Environment,
        Self::MetricName,
        Self::Status,
    ];

    /// Wire name used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Endpoint => "endpoint",
            Self::Region => "region",
            Self::Environment => "environment",
            Self::MetricName => "metric_name",
            Self::Status => "status",
        }
    }

    /// Human-readable label used in breadcrumbs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Service => "Service",
            Self::Endpoint => "Endpoint",
            Self::Region => "Region",
            Self::Environment => "Environment",
            Self::MetricName => "Metric",
            Self::Status => "Status",
        }
    }

    /// Whether the aggregation endpoint accepts this dimension as `group_by`.
    #[must_use]
    pub const fn is_groupable(self) -> bool {
        !matches!(self, Self::Status)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ContextError::UnknownDimension(s.to_string()))
    }
}

/// Aggregation function applied by the aggregation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Arithmetic mean.
    #[default]
    Avg,
    /// Sum of values.
    Sum,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Number of samples.
    Count,
}

impl Aggregation {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket width accepted by the time-series endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// One minute.
    #[serde(rename = "1m")]
    OneMinute,
    /// Five minutes.
    #[serde(rename = "5m")]
    FiveMinutes,
    /// Fifteen minutes.
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// One hour.
    #[serde(rename = "1h")]
    OneHour,
    /// Six hours.
    #[serde(rename = "6h")]
    SixHours,
    /// One day.
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::OneDay => "1d",
        }
    }

    /// Bucket width in minutes.
    #[must_use]
    pub const fn minutes(self) -> i64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::OneHour => 60,
            Self::SixHours => 360,
            Self::OneDay => 1440,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
