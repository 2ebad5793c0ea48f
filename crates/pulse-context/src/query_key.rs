//! Query keys and per-widget fetch tracking.
//!
//! A widget refetches only when the slices of the query context it depends
//! on change. Every fetch is tagged with the key that triggered it, and a
//! response is accepted only if its key is still the widget's current key.
//! Late responses for superseded keys are dropped.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::drilldown::Breadcrumb;
use crate::error::FetchError;
use crate::store::QueryContextSnapshot;
use crate::types::Dimension;
use crate::widget::WidgetId;
use crate::zoom::ZoomRange;

const FINGERPRINT_PREFIX: &str = "pulse:query:";

/// Which filters a widget reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterScope {
    /// No filters.
    None,
    /// Every active filter.
    All,
    /// Every active filter except one dimension.
    Excluding(Dimension),
}

/// Slices of the query context a widget depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetDeps {
    /// Reads the time range.
    pub time_range: bool,
    /// Filters read.
    pub filters: FilterScope,
    /// Reads the drill-down trail.
    pub drilldown: bool,
    /// Reads the shared zoom.
    pub zoom: bool,
}

impl WidgetDeps {
    /// Bar, pie and table widgets.
    pub const CHART: Self = Self {
        time_range: true,
        filters: FilterScope::All,
        drilldown: false,
        zoom: false,
    };

    /// The time-series widget.
    pub const TIME_SERIES: Self = Self {
        time_range: true,
        filters: FilterScope::All,
        drilldown: false,
        zoom: true,
    };

    /// A dropdown listing candidates for `dimension`.
    #[must_use]
    pub const fn options_for(dimension: Dimension) -> Self {
        Self {
            time_range: false,
            filters: FilterScope::Excluding(dimension),
            drilldown: false,
            zoom: false,
        }
    }
}

/// Structurally comparable fetch key built from the slices a widget reads.
///
/// The preset label is not part of the key; two ranges with the same bounds
/// produce the same data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    filters: Vec<(Dimension, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drilldown: Option<Vec<Breadcrumb>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zoom: Option<ZoomRange>,
}

impl QueryKey {
    /// Builds the key for `deps` from `snapshot`.
    #[must_use]
    pub fn derive(snapshot: &QueryContextSnapshot, deps: &WidgetDeps) -> Self {
        let time_range = deps
            .time_range
            .then(|| (snapshot.time_range().start(), snapshot.time_range().end()));

        let filters = match deps.filters {
            FilterScope::None => Vec::new(),
            FilterScope::All => snapshot
                .filters()
                .iter_active()
                .map(|(d, v)| (d, v.to_string()))
                .collect(),
            FilterScope::Excluding(dimension) => snapshot.filters().active_excluding(dimension),
        };

        Self {
            time_range,
            filters,
            drilldown: deps
                .drilldown
                .then(|| snapshot.drilldown().breadcrumbs().to_vec()),
            zoom: deps.zoom.then(|| *snapshot.zoom()),
        }
    }

    /// Filters included in the key, in dimension order.
    #[must_use]
    pub fn filters(&self) -> &[(Dimension, String)] {
        &self.filters
    }

    /// Stable hash of the key's canonical JSON form.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        format!("{FINGERPRINT_PREFIX}{}", blake3::hash(&canonical).to_hex())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Tag attached to an in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Widget that issued the fetch.
    pub widget: WidgetId,
    /// Per-widget sequence number.
    pub seq: u64,
    /// Key the fetch was issued for.
    pub key: QueryKey,
}

/// Display state of one widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WidgetStatus {
    /// Nothing fetched yet.
    #[default]
    Idle,
    /// A fetch for the current key is in flight.
    Loading,
    /// Data for the current key is shown.
    Ready,
    /// The last fetch for the current key failed.
    Failed(FetchError),
}

impl WidgetStatus {
    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for WidgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "failed: {err}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of settling a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    /// The response matches the current key and carries data.
    Ready(T),
    /// The fetch for the current key failed.
    Failed(FetchError),
    /// The response was for a superseded key and was dropped.
    Discarded,
}

impl<T> Completion<T> {
    /// Whether the response was applied to the widget.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        !matches!(self, Self::Discarded)
    }
}

/// Fetch bookkeeping for one widget.
#[derive(Debug, Clone)]
pub struct FetchTracker {
    widget: WidgetId,
    current: Option<QueryKey>,
    completed: Option<QueryKey>,
    settled: WidgetStatus,
    in_flight: BTreeMap<u64, QueryKey>,
    next_seq: u64,
    status: WidgetStatus,
}

impl FetchTracker {
    /// Creates a tracker with no key observed.
    #[must_use]
    pub fn new(widget: WidgetId) -> Self {
        Self {
            widget,
            current: None,
            completed: None,
            settled: WidgetStatus::Idle,
            in_flight: BTreeMap::new(),
            next_seq: 0,
            status: WidgetStatus::Idle,
        }
    }

    /// Widget this tracker belongs to.
    #[must_use]
    pub fn widget(&self) -> &WidgetId {
        &self.widget
    }

    /// Current key.
    #[must_use]
    pub fn current(&self) -> Option<&QueryKey> {
        self.current.as_ref()
    }

    /// Display state.
    #[must_use]
    pub fn status(&self) -> &WidgetStatus {
        &self.status
    }

    /// Number of fetches not yet settled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Records the key derived from the latest snapshot. Returns `true` if
    /// it differs from the previous one.
    pub fn observe(&mut self, key: QueryKey) -> bool {
        if self.current.as_ref() == Some(&key) {
            return false;
        }
        self.current = Some(key);
        true
    }

    /// Whether the current key has neither completed nor been requested.
    #[must_use]
    pub fn needs_fetch(&self) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        self.completed.as_ref() != Some(current) && !self.in_flight.values().any(|k| k == current)
    }

    /// Issues a ticket for the current key if a fetch is needed.
    pub fn begin(&mut self) -> Option<FetchTicket> {
        if !self.needs_fetch() {
            return None;
        }
        let key = self.current.clone()?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.insert(seq, key.clone());
        self.status = WidgetStatus::Loading;
        debug!(widget = %self.widget, seq, key = %key, "fetch started");

        Some(FetchTicket {
            widget: self.widget.clone(),
            seq,
            key,
        })
    }

    /// Settles `ticket` with the fetch result.
    ///
    /// Success and failure both mark the key as completed, so a failed fetch
    /// is not retried until the key changes.
    pub fn settle<T>(
        &mut self,
        ticket: &FetchTicket,
        result: std::result::Result<T, FetchError>,
    ) -> Completion<T> {
        self.in_flight.remove(&ticket.seq);

        if self.current.as_ref() != Some(&ticket.key) {
            warn!(
                widget = %self.widget,
                seq = ticket.seq,
                "discarding response for superseded query key"
            );
            if self.in_flight.is_empty() && self.status == WidgetStatus::Loading {
                // The current key may have completed before the detour.
                self.status = if self.completed.is_some() && self.completed == self.current {
                    self.settled.clone()
                } else {
                    WidgetStatus::Idle
                };
            }
            return Completion::Discarded;
        }

        self.completed = Some(ticket.key.clone());
        let completion = match result {
            Ok(data) => {
                self.status = WidgetStatus::Ready;
                Completion::Ready(data)
            }
            Err(err) => {
                warn!(widget = %self.widget, seq = ticket.seq, error = %err, "fetch failed");
                self.status = WidgetStatus::Failed(err.clone());
                Completion::Failed(err)
            }
        };
        self.settled = self.status.clone();
        completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_range::{PresetId, TimeRange};
    use chrono::{Duration, TimeZone};

    fn range(hours: i64) -> TimeRange {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        TimeRange::new(end - Duration::hours(hours), end).unwrap()
    }

    fn snapshot() -> QueryContextSnapshot {
        QueryContextSnapshot::initial(range(24))
    }

    #[test]
    fn chart_key_ignores_zoom() {
        let base = snapshot();
        let zoomed = base.with_zoom(
            ZoomRange::new(Some(base.time_range().start()), Some(base.time_range().end())).unwrap(),
        );

        assert_eq!(
            QueryKey::derive(&base, &WidgetDeps::CHART),
            QueryKey::derive(&zoomed, &WidgetDeps::CHART)
        );
        assert_ne!(
            QueryKey::derive(&base, &WidgetDeps::TIME_SERIES),
            QueryKey::derive(&zoomed, &WidgetDeps::TIME_SERIES)
        );
    }

    #[test]
    fn key_ignores_preset_label() {
        let custom = snapshot();
        let preset = custom.with_time_range(
            TimeRange::ending_at(PresetId::Last24Hours, Duration::hours(24), custom.time_range().end())
                .unwrap(),
        );

        assert_eq!(
            QueryKey::derive(&custom, &WidgetDeps::CHART),
            QueryKey::derive(&preset, &WidgetDeps::CHART)
        );
    }

    #[test]
    fn options_key_excludes_own_dimension() {
        let base = snapshot().with_filter(Dimension::Region, Some("eu-west-1"));
        let deps = WidgetDeps::options_for(Dimension::Service);
        let before = QueryKey::derive(&base, &deps);

        let own = base.with_filter(Dimension::Service, Some("checkout-api"));
        assert_eq!(QueryKey::derive(&own, &deps), before);

        let other = base.with_filter(Dimension::Environment, Some("prod"));
        assert_ne!(QueryKey::derive(&other, &deps), before);

        let later = base.with_time_range(range(1));
        assert_eq!(QueryKey::derive(&later, &deps), before);
    }

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let a = QueryKey::derive(&snapshot(), &WidgetDeps::CHART);
        let b = QueryKey::derive(&snapshot(), &WidgetDeps::CHART);
        let c = QueryKey::derive(
            &snapshot().with_filter(Dimension::Service, Some("x")),
            &WidgetDeps::CHART,
        );

        assert!(a.fingerprint().starts_with(FINGERPRINT_PREFIX));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    fn key_for(service: &str) -> QueryKey {
        QueryKey::derive(
            &snapshot().with_filter(Dimension::Service, Some(service)),
            &WidgetDeps::CHART,
        )
    }

    #[test]
    fn tracker_fetches_once_per_key() {
        let mut tracker = FetchTracker::new(WidgetId::new("bar"));
        assert!(!tracker.needs_fetch());

        tracker.observe(key_for("a"));
        let ticket = tracker.begin().unwrap();
        assert!(tracker.begin().is_none());
        assert_eq!(tracker.status(), &WidgetStatus::Loading);

        assert_eq!(tracker.settle(&ticket, Ok(7)), Completion::Ready(7));
        assert_eq!(tracker.status(), &WidgetStatus::Ready);
        assert!(!tracker.needs_fetch());

        assert!(!tracker.observe(key_for("a")));
        assert!(tracker.begin().is_none());
    }

    #[test]
    fn late_response_for_old_key_is_discarded() {
        let mut tracker = FetchTracker::new(WidgetId::new("bar"));
        tracker.observe(key_for("a"));
        let first = tracker.begin().unwrap();

        tracker.observe(key_for("b"));
        let second = tracker.begin().unwrap();
        assert_ne!(first.seq, second.seq);

        assert_eq!(tracker.settle(&second, Ok("b")), Completion::Ready("b"));
        assert_eq!(tracker.settle(&first, Ok("a")), Completion::Discarded);
        assert_eq!(tracker.status(), &WidgetStatus::Ready);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn returning_to_old_key_accepts_its_response() {
        let mut tracker = FetchTracker::new(WidgetId::new("bar"));
        tracker.observe(key_for("a"));
        let first = tracker.begin().unwrap();

        tracker.observe(key_for("b"));
        tracker.observe(key_for("a"));
        assert!(tracker.begin().is_none());

        assert_eq!(tracker.settle(&first, Ok(1)), Completion::Ready(1));
    }

    #[test]
    fn detour_back_to_completed_key_keeps_ready() {
        let mut tracker = FetchTracker::new(WidgetId::new("bar"));
        tracker.observe(key_for("a"));
        let first = tracker.begin().unwrap();
        assert_eq!(tracker.settle(&first, Ok(1)), Completion::Ready(1));

        tracker.observe(key_for("b"));
        let detour = tracker.begin().unwrap();
        assert_eq!(tracker.status(), &WidgetStatus::Loading);
        tracker.observe(key_for("a"));

        assert_eq!(tracker.settle(&detour, Ok(2)), Completion::Discarded);
        assert_eq!(tracker.status(), &WidgetStatus::Ready);
        assert!(!tracker.needs_fetch());
    }

    #[test]
    fn detour_back_to_failed_key_keeps_failure() {
        let err = FetchError::Request("connection reset".into());
        let mut tracker = FetchTracker::new(WidgetId::new("bar"));
        tracker.observe(key_for("a"));
        let first = tracker.begin().unwrap();
        tracker.settle::<()>(&first, Err(err.clone()));

        tracker.observe(key_for("b"));
        let detour = tracker.begin().unwrap();
        tracker.observe(key_for("a"));

        assert_eq!(tracker.settle::<()>(&detour, Ok(())), Completion::Discarded);
        assert_eq!(tracker.status(), &WidgetStatus::Failed(err));
    }

    #[test]
    fn failure_is_recorded_and_not_retried() {
        let mut tracker = FetchTracker::new(WidgetId::new("bar"));
        tracker.observe(key_for("a"));
        let ticket = tracker.begin().unwrap();

        let err = FetchError::Status {
            status: 503,
            message: "unavailable".into(),
        };
        let completion = tracker.settle::<()>(&ticket, Err(err.clone()));
        assert_eq!(completion, Completion::Failed(err.clone()));
        assert_eq!(tracker.status(), &WidgetStatus::Failed(err));
        assert!(!tracker.needs_fetch());

        tracker.observe(key_for("b"));
        assert!(tracker.needs_fetch());
    }

    #[test]
    fn discard_without_replacement_returns_to_idle() {
        let mut tracker = FetchTracker::new(WidgetId::new("bar"));
        tracker.observe(key_for("a"));
        let ticket = tracker.begin().unwrap();
        tracker.observe(key_for("b"));

        assert_eq!(tracker.settle(&ticket, Ok(())), Completion::Discarded);
        assert_eq!(tracker.status(), &WidgetStatus::Idle);
        assert!(tracker.needs_fetch());
    }
}
