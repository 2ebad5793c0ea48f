//! Dashboard widgets and the requests they derive from the query context.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::{
    AggregatedRequest, MetricsRequest, OptionsRequest, TimeseriesRequest, WidgetRequest,
};
use crate::error::{ContextError, Result};
use crate::query_key::WidgetDeps;
use crate::store::QueryContextSnapshot;
use crate::types::{Aggregation, Dimension, Interval};

/// Unique widget identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(String);

impl WidgetId {
    /// Creates an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WidgetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What a widget shows and therefore what it fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetKind {
    /// Bar, pie or table chart over one grouping dimension.
    Aggregated {
        /// Grouping dimension.
        group_by: Dimension,
        /// Aggregation function.
        #[serde(default)]
        aggregation: Aggregation,
    },
    /// Time-series chart.
    Timeseries {
        /// Fixed bucket width; chosen from the range width when unset.
        #[serde(default)]
        interval: Option<Interval>,
    },
    /// Raw metric table.
    Metrics,
    /// Dropdown of candidate values for one dimension.
    Options {
        /// Dimension the dropdown selects.
        dimension: Dimension,
    },
}

impl WidgetKind {
    /// Rejects widget definitions the backend cannot serve.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Aggregated { group_by, .. } if !group_by.is_groupable() => {
                Err(ContextError::UnsupportedGroupBy(*group_by))
            }
            _ => Ok(()),
        }
    }

    /// Context slices this widget reads.
    #[must_use]
    pub const fn deps(&self) -> WidgetDeps {
        match self {
            Self::Aggregated { .. } | Self::Metrics => WidgetDeps::CHART,
            Self::Timeseries { .. } => WidgetDeps::TIME_SERIES,
            Self::Options { dimension } => WidgetDeps::options_for(*dimension),
        }
    }

    /// Options dimension, if this is a dropdown.
    #[must_use]
    pub const fn options_dimension(&self) -> Option<Dimension> {
        match self {
            Self::Options { dimension } => Some(*dimension),
            _ => None,
        }
    }

    /// Request parameters for the current snapshot.
    #[must_use]
    pub fn request(&self, snapshot: &QueryContextSnapshot) -> WidgetRequest {
        match self {
            Self::Aggregated {
                group_by,
                aggregation,
            } => WidgetRequest::Aggregated(AggregatedRequest::new(snapshot, *group_by, *aggregation)),
            Self::Timeseries { interval } => {
                WidgetRequest::Timeseries(TimeseriesRequest::new(snapshot, *interval))
            }
            Self::Metrics => WidgetRequest::Metrics(MetricsRequest::new(snapshot)),
            Self::Options { dimension } => {
                WidgetRequest::Options(OptionsRequest::excluding(snapshot, *dimension))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_key::FilterScope;
    use crate::time_range::TimeRange;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn group_by_status_is_rejected() {
        let kind = WidgetKind::Aggregated {
            group_by: Dimension::Status,
            aggregation: Aggregation::Avg,
        };
        assert_eq!(
            kind.validate(),
            Err(ContextError::UnsupportedGroupBy(Dimension::Status))
        );

        let ok = WidgetKind::Aggregated {
            group_by: Dimension::MetricName,
            aggregation: Aggregation::Count,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn kind_deserializes_from_tagged_json() {
        let kind: WidgetKind =
            serde_json::from_str(r#"{"kind":"aggregated","group_by":"region"}"#).unwrap();
        assert_eq!(
            kind,
            WidgetKind::Aggregated {
                group_by: Dimension::Region,
                aggregation: Aggregation::Avg,
            }
        );

        let kind: WidgetKind =
            serde_json::from_str(r#"{"kind":"timeseries","interval":"15m"}"#).unwrap();
        assert_eq!(
            kind,
            WidgetKind::Timeseries {
                interval: Some(Interval::FifteenMinutes)
            }
        );

        let kind: WidgetKind =
            serde_json::from_str(r#"{"kind":"options","dimension":"service"}"#).unwrap();
        assert_eq!(kind.options_dimension(), Some(Dimension::Service));
    }

    #[test]
    fn deps_follow_kind() {
        assert_eq!(WidgetKind::Metrics.deps(), WidgetDeps::CHART);
        assert!(WidgetKind::Timeseries { interval: None }.deps().zoom);
        assert_eq!(
            WidgetKind::Options {
                dimension: Dimension::Region
            }
            .deps()
            .filters,
            FilterScope::Excluding(Dimension::Region)
        );
    }

    #[test]
    fn request_matches_kind() {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let snapshot =
            QueryContextSnapshot::initial(TimeRange::new(end - Duration::hours(2), end).unwrap());

        let request = WidgetKind::Timeseries { interval: None }.request(&snapshot);
        match request {
            WidgetRequest::Timeseries(ts) => assert_eq!(ts.interval, Interval::FiveMinutes),
            other => panic!("unexpected request: {other:?}"),
        }

        let request = WidgetKind::Metrics.request(&snapshot);
        assert!(matches!(request, WidgetRequest::Metrics(_)));
    }
}
