//! Backend request contract.
//!
//! Typed parameters and responses for the four read endpoints, and the
//! [`DashboardApi`] trait the HTTP client implements. Times are sent as
//! RFC 3339; the backend answers with naive UTC timestamps.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::filters::FilterMap;
use crate::reconcile::AvailableOptions;
use crate::store::QueryContextSnapshot;
use crate::types::{Aggregation, Dimension, Interval};

/// Result of one backend call.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Query string pairs in emission order.
pub type QueryPairs = Vec<(&'static str, String)>;

/// The four read endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// `GET /filters/available`
    Options,
    /// `GET /dashboard/aggregated`
    Aggregated,
    /// `GET /dashboard/timeseries`
    Timeseries,
    /// `GET /dashboard/metrics`
    Metrics,
}

impl Endpoint {
    /// Request path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Options => "/filters/available",
            Self::Aggregated => "/dashboard/aggregated",
            Self::Timeseries => "/dashboard/timeseries",
            Self::Metrics => "/dashboard/metrics",
        }
    }

    /// Short name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Options => "options",
            Self::Aggregated => "aggregated",
            Self::Timeseries => "timeseries",
            Self::Metrics => "metrics",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn active(filters: &FilterMap) -> Vec<(Dimension, String)> {
    filters
        .iter_active()
        .map(|(d, v)| (d, v.to_string()))
        .collect()
}

/// Splits the metric name out of the active filters; the chart endpoints
/// take it as a dedicated parameter.
fn split_metric(filters: &FilterMap) -> (Option<String>, Vec<(Dimension, String)>) {
    (
        filters.get(Dimension::MetricName).map(str::to_string),
        filters.active_excluding(Dimension::MetricName),
    )
}

fn push_filters(pairs: &mut QueryPairs, filters: &[(Dimension, String)]) {
    pairs.extend(filters.iter().map(|(d, v)| (d.as_str(), v.clone())));
}

/// Candidate lists request for one dimension's dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionsRequest {
    /// Dimension whose candidates are requested.
    pub target: Dimension,
    /// Active filters other than `target`.
    pub filters: Vec<(Dimension, String)>,
}

impl OptionsRequest {
    /// Builds the request for `target`, leaving out its own filter so the
    /// dropdown still lists alternatives to the current selection.
    #[must_use]
    pub fn excluding(snapshot: &QueryContextSnapshot, target: Dimension) -> Self {
        Self {
            target,
            filters: snapshot.filters().active_excluding(target),
        }
    }

    /// Query string pairs.
    #[must_use]
    pub fn to_query_pairs(&self) -> QueryPairs {
        let mut pairs = Vec::with_capacity(self.filters.len());
        push_filters(&mut pairs, &self.filters);
        pairs
    }
}

/// Grouped aggregate request for bar, pie and table charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedRequest {
    /// Range start.
    pub start_time: DateTime<Utc>,
    /// Range end.
    pub end_time: DateTime<Utc>,
    /// Grouping dimension.
    pub group_by: Dimension,
    /// Metric to aggregate; the backend default applies when unset.
    pub metric_name: Option<String>,
    /// Aggregation function.
    pub aggregation: Aggregation,
    /// Active filters other than the metric name.
    pub filters: Vec<(Dimension, String)>,
}

impl AggregatedRequest {
    /// Builds the request from a snapshot.
    #[must_use]
    pub fn new(
        snapshot: &QueryContextSnapshot,
        group_by: Dimension,
        aggregation: Aggregation,
    ) -> Self {
        let (metric_name, filters) = split_metric(snapshot.filters());
        Self {
            start_time: snapshot.time_range().start(),
            end_time: snapshot.time_range().end(),
            group_by,
            metric_name,
            aggregation,
            filters,
        }
    }

    /// Query string pairs.
    #[must_use]
    pub fn to_query_pairs(&self) -> QueryPairs {
        let mut pairs = vec![
            ("start_time", rfc3339(self.start_time)),
            ("end_time", rfc3339(self.end_time)),
            ("group_by", self.group_by.as_str().to_string()),
        ];
        if let Some(metric) = &self.metric_name {
            pairs.push(("metric_name", metric.clone()));
        }
        pairs.push(("aggregation", self.aggregation.as_str().to_string()));
        push_filters(&mut pairs, &self.filters);
        pairs
    }
}

/// Bucketed time-series request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeseriesRequest {
    /// Range start.
    pub start_time: DateTime<Utc>,
    /// Range end.
    pub end_time: DateTime<Utc>,
    /// Metric to plot; the backend default applies when unset.
    pub metric_name: Option<String>,
    /// Bucket width.
    pub interval: Interval,
    /// Zoom lower bound.
    pub zoom_min: Option<DateTime<Utc>>,
    /// Zoom upper bound.
    pub zoom_max: Option<DateTime<Utc>>,
    /// Active filters other than the metric name.
    pub filters: Vec<(Dimension, String)>,
}

impl TimeseriesRequest {
    /// Builds the request from a snapshot. Without a fixed `interval` the
    /// bucket width follows the range width.
    #[must_use]
    pub fn new(snapshot: &QueryContextSnapshot, interval: Option<Interval>) -> Self {
        let range = snapshot.time_range();
        let (metric_name, filters) = split_metric(snapshot.filters());
        Self {
            start_time: range.start(),
            end_time: range.end(),
            metric_name,
            interval: interval.unwrap_or_else(|| range.suggested_interval()),
            zoom_min: snapshot.zoom().min(),
            zoom_max: snapshot.zoom().max(),
            filters,
        }
    }

    /// Query string pairs.
    #[must_use]
    pub fn to_query_pairs(&self) -> QueryPairs {
        let mut pairs = vec![
            ("start_time", rfc3339(self.start_time)),
            ("end_time", rfc3339(self.end_time)),
        ];
        if let Some(metric) = &self.metric_name {
            pairs.push(("metric_name", metric.clone()));
        }
        pairs.push(("interval", self.interval.as_str().to_string()));
        if let Some(min) = self.zoom_min {
            pairs.push(("zoom_min", rfc3339(min)));
        }
        if let Some(max) = self.zoom_max {
            pairs.push(("zoom_max", rfc3339(max)));
        }
        push_filters(&mut pairs, &self.filters);
        pairs
    }
}

/// Raw metric listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsRequest {
    /// Range start.
    pub start_time: DateTime<Utc>,
    /// Range end.
    pub end_time: DateTime<Utc>,
    /// Every active filter.
    pub filters: Vec<(Dimension, String)>,
}

impl MetricsRequest {
    /// Builds the request from a snapshot.
    #[must_use]
    pub fn new(snapshot: &QueryContextSnapshot) -> Self {
        Self {
            start_time: snapshot.time_range().start(),
            end_time: snapshot.time_range().end(),
            filters: active(snapshot.filters()),
        }
    }

    /// Query string pairs.
    #[must_use]
    pub fn to_query_pairs(&self) -> QueryPairs {
        let mut pairs = vec![
            ("start_time", rfc3339(self.start_time)),
            ("end_time", rfc3339(self.end_time)),
        ];
        push_filters(&mut pairs, &self.filters);
        pairs
    }
}

/// Request issued by one widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "endpoint", rename_all = "snake_case")]
pub enum WidgetRequest {
    /// Dropdown candidates.
    Options(OptionsRequest),
    /// Grouped aggregate.
    Aggregated(AggregatedRequest),
    /// Time series.
    Timeseries(TimeseriesRequest),
    /// Raw metrics.
    Metrics(MetricsRequest),
}

impl WidgetRequest {
    /// Target endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::Options(_) => Endpoint::Options,
            Self::Aggregated(_) => Endpoint::Aggregated,
            Self::Timeseries(_) => Endpoint::Timeseries,
            Self::Metrics(_) => Endpoint::Metrics,
        }
    }

    /// Query string pairs.
    #[must_use]
    pub fn to_query_pairs(&self) -> QueryPairs {
        match self {
            Self::Options(r) => r.to_query_pairs(),
            Self::Aggregated(r) => r.to_query_pairs(),
            Self::Timeseries(r) => r.to_query_pairs(),
            Self::Metrics(r) => r.to_query_pairs(),
        }
    }
}

/// One group in an aggregated response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    /// Group value.
    pub dimension: String,
    /// Aggregated value.
    pub value: f64,
    /// Samples in the group.
    pub count: u64,
}

/// Response of `/dashboard/aggregated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    /// Groups, largest average first.
    pub data: Vec<AggregatedPoint>,
    /// Grouping dimension.
    pub group_by: Dimension,
    /// Metric name.
    pub metric: String,
    /// Aggregation function.
    pub aggregation: Aggregation,
}

/// One bucket in a time-series response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    /// Bucket start (UTC, no offset on the wire).
    pub timestamp: NaiveDateTime,
    /// Mean of the bucket.
    pub value: f64,
    /// Bucket minimum.
    #[serde(default)]
    pub min: Option<f64>,
    /// Bucket maximum.
    #[serde(default)]
    pub max: Option<f64>,
    /// Samples in the bucket.
    #[serde(default)]
    pub count: Option<u64>,
}

/// Response of `/dashboard/timeseries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesResponse {
    /// Buckets in time order.
    pub data: Vec<TimeseriesPoint>,
    /// Bucket width.
    pub interval: Interval,
    /// Metric name.
    pub metric: String,
}

/// One raw metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Row id.
    pub id: i64,
    /// Sample time (UTC, no offset on the wire).
    pub timestamp: NaiveDateTime,
    /// Service.
    pub service: String,
    /// Endpoint.
    pub endpoint: String,
    /// Region.
    pub region: String,
    /// Environment.
    pub environment: String,
    /// Metric name.
    pub metric_name: String,
    /// Value.
    pub value: f64,
    /// Status.
    pub status: String,
}

/// Window echoed by `/dashboard/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseWindow {
    /// Start.
    pub start: NaiveDateTime,
    /// End.
    pub end: NaiveDateTime,
}

/// Response of `/dashboard/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Samples, newest first.
    pub metrics: Vec<MetricRecord>,
    /// Number of samples.
    pub count: usize,
    /// Queried window.
    pub time_range: ResponseWindow,
}

/// Response data for one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "endpoint", content = "data", rename_all = "snake_case")]
pub enum WidgetData {
    /// Dropdown candidates.
    Options(AvailableOptions),
    /// Grouped aggregate.
    Aggregated(AggregatedResponse),
    /// Time series.
    Timeseries(TimeseriesResponse),
    /// Raw metrics.
    Metrics(MetricsResponse),
}

/// Backend client seam.
///
/// The coordinator never performs I/O itself; implementations decide on
/// transport, base URL and timeouts.
#[allow(async_fn_in_trait)]
pub trait DashboardApi {
    /// `GET /filters/available`
    async fn available_options(&self, request: &OptionsRequest) -> FetchResult<AvailableOptions>;

    /// `GET /dashboard/aggregated`
    async fn aggregated(&self, request: &AggregatedRequest) -> FetchResult<AggregatedResponse>;

    /// `GET /dashboard/timeseries`
    async fn timeseries(&self, request: &TimeseriesRequest) -> FetchResult<TimeseriesResponse>;

    /// `GET /dashboard/metrics`
    async fn metrics(&self, request: &MetricsRequest) -> FetchResult<MetricsResponse>;
}

/// Sends `request` to the matching endpoint.
pub async fn execute<A: DashboardApi>(api: &A, request: &WidgetRequest) -> FetchResult<WidgetData> {
    Ok(match request {
        WidgetRequest::Options(r) => WidgetData::Options(api.available_options(r).await?),
        WidgetRequest::Aggregated(r) => WidgetData::Aggregated(api.aggregated(r).await?),
        WidgetRequest::Timeseries(r) => WidgetData::Timeseries(api.timeseries(r).await?),
        WidgetRequest::Metrics(r) => WidgetData::Metrics(api.metrics(r).await?),
    })
}

/// Canned responses, loaded from JSON.
///
/// Serves replays and tests. An endpoint without a fixture answers with a
/// 404 status error. Options responses are keyed by target dimension, with
/// `default` as the fallback.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StaticApi {
    options: BTreeMap<String, AvailableOptions>,
    aggregated: Option<AggregatedResponse>,
    timeseries: Option<TimeseriesResponse>,
    metrics: Option<MetricsResponse>,
    #[serde(skip)]
    calls: Mutex<Vec<Endpoint>>,
}

impl StaticApi {
    /// Parses fixtures from JSON.
    pub fn from_json(json: &str) -> FetchResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the options answer for every target.
    #[must_use]
    pub fn with_options(mut self, options: AvailableOptions) -> Self {
        self.options.insert("default".to_string(), options);
        self
    }

    /// Sets the options answer for one target dimension.
    #[must_use]
    pub fn with_options_for(mut self, target: Dimension, options: AvailableOptions) -> Self {
        self.options.insert(target.as_str().to_string(), options);
        self
    }

    /// Sets the aggregated answer.
    #[must_use]
    pub fn with_aggregated(mut self, response: AggregatedResponse) -> Self {
        self.aggregated = Some(response);
        self
    }

    /// Sets the time-series answer.
    #[must_use]
    pub fn with_timeseries(mut self, response: TimeseriesResponse) -> Self {
        self.timeseries = Some(response);
        self
    }

    /// Sets the metrics answer.
    #[must_use]
    pub fn with_metrics(mut self, response: MetricsResponse) -> Self {
        self.metrics = Some(response);
        self
    }

    /// Endpoints called so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<Endpoint> {
        self.calls.lock().clone()
    }

    fn answer<T: Clone>(&self, endpoint: Endpoint, fixture: Option<&T>) -> FetchResult<T> {
        self.calls.lock().push(endpoint);
        fixture.cloned().ok_or_else(|| FetchError::Status {
            status: 404,
            message: format!("no fixture for {}", endpoint.path()),
        })
    }
}

impl DashboardApi for StaticApi {
    async fn available_options(&self, request: &OptionsRequest) -> FetchResult<AvailableOptions> {
        let fixture = self
            .options
            .get(request.target.as_str())
            .or_else(|| self.options.get("default"));
        self.answer(Endpoint::Options, fixture)
    }

    async fn aggregated(&self, _request: &AggregatedRequest) -> FetchResult<AggregatedResponse> {
        self.answer(Endpoint::Aggregated, self.aggregated.as_ref())
    }

    async fn timeseries(&self, _request: &TimeseriesRequest) -> FetchResult<TimeseriesResponse> {
        self.answer(Endpoint::Timeseries, self.timeseries.as_ref())
    }

    async fn metrics(&self, _request: &MetricsRequest) -> FetchResult<MetricsResponse> {
        self.answer(Endpoint::Metrics, self.metrics.as_ref())
    }
}
