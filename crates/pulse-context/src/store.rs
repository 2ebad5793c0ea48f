//! The query-context store.
//!
//! [`QueryContextStore`] owns the current [`QueryContextSnapshot`] and is the
//! only place that can replace it. Each transition builds a new snapshot from
//! the current one and commits it; a transition that yields the same state
//! keeps the current snapshot, so repeated calls with the same arguments are
//! no-ops.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::clock::Clock;
use crate::config::ContextConfig;
use crate::drilldown::{DrilldownNavigator, DrilldownState};
use crate::error::Result;
use crate::filters::FilterMap;
use crate::reconcile::Reconciliation;
use crate::time_range::{PresetId, TimeRange, TimeRangeController};
use crate::types::Dimension;
use crate::zoom::ZoomRange;

/// Immutable view of the query context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryContextSnapshot {
    revision: u64,
    time_range: TimeRange,
    filters: FilterMap,
    drilldown: DrilldownState,
    zoom: ZoomRange,
}

impl QueryContextSnapshot {
    /// Initial state for a time range: no filters, no drill-down, no zoom.
    #[must_use]
    pub fn initial(time_range: TimeRange) -> Self {
        Self {
            revision: 0,
            time_range,
            filters: FilterMap::new(),
            drilldown: DrilldownState::default(),
            zoom: ZoomRange::none(),
        }
    }

    /// Number of state-changing transitions applied so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Selected time range.
    #[must_use]
    pub fn time_range(&self) -> &TimeRange {
        &self.time_range
    }

    /// Categorical filters.
    #[must_use]
    pub fn filters(&self) -> &FilterMap {
        &self.filters
    }

    /// Drill-down trail.
    #[must_use]
    pub fn drilldown(&self) -> &DrilldownState {
        &self.drilldown
    }

    /// Shared zoom.
    #[must_use]
    pub fn zoom(&self) -> &ZoomRange {
        &self.zoom
    }

    /// Whether both snapshots describe the same state, ignoring revisions.
    #[must_use]
    pub fn same_state(&self, other: &Self) -> bool {
        self.time_range == other.time_range
            && self.filters == other.filters
            && self.drilldown == other.drilldown
            && self.zoom == other.zoom
    }

    /// Snapshot with the time range replaced.
    #[must_use]
    pub fn with_time_range(&self, time_range: TimeRange) -> Self {
        Self {
            time_range,
            ..self.clone()
        }
    }

    /// Snapshot with one filter replaced; `None` or `""` clears it.
    #[must_use]
    pub fn with_filter(&self, dimension: Dimension, value: Option<&str>) -> Self {
        let mut next = self.clone();
        next.filters.set(dimension, value);
        next
    }

    /// Snapshot with one filter cleared.
    #[must_use]
    pub fn without_filter(&self, dimension: Dimension) -> Self {
        let mut next = self.clone();
        next.filters.clear(dimension);
        next
    }

    /// Snapshot with every filter cleared and the drill-down trail emptied.
    #[must_use]
    pub fn with_filters_cleared(&self) -> Self {
        Self {
            filters: FilterMap::new(),
            drilldown: DrilldownState::default(),
            ..self.clone()
        }
    }

    /// Snapshot with the zoom replaced.
    #[must_use]
    pub fn with_zoom(&self, zoom: ZoomRange) -> Self {
        Self {
            zoom,
            ..self.clone()
        }
    }
}

/// Single-writer owner of the query context.
#[derive(Debug)]
pub struct QueryContextStore {
    time: TimeRangeController,
    navigator: DrilldownNavigator,
    current: Arc<QueryContextSnapshot>,
    updates: watch::Sender<Arc<QueryContextSnapshot>>,
}

impl QueryContextStore {
    /// Creates a store with the configured default preset resolved against
    /// `clock`.
    pub fn new(config: &ContextConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let time = TimeRangeController::new(config.presets.clone(), clock);
        let range = time.resolve(config.default_preset)?;
        let current = Arc::new(QueryContextSnapshot::initial(range));
        let (updates, _) = watch::channel(Arc::clone(&current));
        debug!(preset = %config.default_preset, "query context created");

        Ok(Self {
            time,
            navigator: DrilldownNavigator::new(config.drilldown_policy, config.hierarchy.clone()),
            current,
            updates,
        })
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<QueryContextSnapshot> {
        Arc::clone(&self.current)
    }

    /// Receiver that observes every committed snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<QueryContextSnapshot>> {
        self.updates.subscribe()
    }

    /// Preset resolution.
    #[must_use]
    pub fn time_controller(&self) -> &TimeRangeController {
        &self.time
    }

    /// Drill-down transitions.
    #[must_use]
    pub fn navigator(&self) -> &DrilldownNavigator {
        &self.navigator
    }

    /// Replaces the whole time range.
    pub fn set_time_range(&mut self, range: TimeRange) -> Arc<QueryContextSnapshot> {
        let next = self.current.with_time_range(range);
        self.commit(next, "set_time_range")
    }

    /// Resolves `preset` against the clock and sets the result.
    pub fn apply_preset(&mut self, preset: PresetId) -> Result<Arc<QueryContextSnapshot>> {
        let range = self.time.resolve(preset)?;
        Ok(self.commit(self.current.with_time_range(range), "apply_preset"))
    }

    /// Sets one filter; `None` or `""` clears it.
    pub fn set_filter(
        &mut self,
        dimension: Dimension,
        value: Option<&str>,
    ) -> Arc<QueryContextSnapshot> {
        let next = self.current.with_filter(dimension, value);
        self.commit(next, "set_filter")
    }

    /// Clears one filter.
    pub fn clear_filter(&mut self, dimension: Dimension) -> Arc<QueryContextSnapshot> {
        let next = self.current.without_filter(dimension);
        self.commit(next, "clear_filter")
    }

    /// Clears every filter and the drill-down trail.
    pub fn clear_all_filters(&mut self) -> Arc<QueryContextSnapshot> {
        let next = self.current.with_filters_cleared();
        self.commit(next, "clear_all_filters")
    }

    /// Drills into `dimension = value`.
    pub fn drill_down(
        &mut self,
        dimension: Dimension,
        value: &str,
    ) -> Result<Arc<QueryContextSnapshot>> {
        let mut next = self.current.as_ref().clone();
        self.navigator
            .drill_down(&mut next.drilldown, &mut next.filters, dimension, value)?;
        Ok(self.commit(next, "drill_down"))
    }

    /// Drills into the next hierarchy level with `value`.
    pub fn drill_next(&mut self, value: &str) -> Result<Arc<QueryContextSnapshot>> {
        let mut next = self.current.as_ref().clone();
        self.navigator
            .drill_next(&mut next.drilldown, &mut next.filters, value)?;
        Ok(self.commit(next, "drill_next"))
    }

    /// Cuts the trail back to `to_level` steps.
    pub fn drill_up(&mut self, to_level: usize) -> Result<Arc<QueryContextSnapshot>> {
        let mut next = self.current.as_ref().clone();
        self.navigator
            .drill_up(&mut next.drilldown, &mut next.filters, to_level)?;
        Ok(self.commit(next, "drill_up"))
    }

    /// Empties the trail.
    pub fn reset_drilldown(&mut self) -> Arc<QueryContextSnapshot> {
        let mut next = self.current.as_ref().clone();
        self.navigator.reset(&mut next.drilldown, &mut next.filters);
        self.commit(next, "reset_drilldown")
    }

    /// Replaces the shared zoom.
    pub fn set_zoom(&mut self, zoom: ZoomRange) -> Arc<QueryContextSnapshot> {
        let next = self.current.with_zoom(zoom);
        self.commit(next, "set_zoom")
    }

    /// Removes the shared zoom.
    pub fn clear_zoom(&mut self) -> Arc<QueryContextSnapshot> {
        let next = self.current.with_zoom(ZoomRange::none());
        self.commit(next, "clear_zoom")
    }

    /// Applies reconciler output as a single transition.
    pub fn apply_reconciliation(
        &mut self,
        reconciliation: &Reconciliation,
    ) -> Arc<QueryContextSnapshot> {
        let mut next = self.current.as_ref().clone();
        reconciliation.apply_to(&mut next.filters);
        self.commit(next, "reconcile")
    }

    fn commit(
        &mut self,
        mut next: QueryContextSnapshot,
        transition: &'static str,
    ) -> Arc<QueryContextSnapshot> {
        if next.same_state(&self.current) {
            return Arc::clone(&self.current);
        }
        next.revision = self.current.revision + 1;
        let next = Arc::new(next);
        self.current = Arc::clone(&next);
        self.updates.send_replace(Arc::clone(&next));
        debug!(
            transition,
            revision = next.revision,
            active_filters = next.filters.active_count(),
            drill_level = next.drilldown.level(),
            "query context updated"
        );
        next
    }
}
