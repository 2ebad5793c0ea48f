//! Dashboard orchestration.
//!
//! [`Dashboard`] ties the store, the options reconciler and the widget fetch
//! trackers together. Events are applied in dispatch order; after each one
//! every widget re-derives its query key, and [`Dashboard::refresh`] issues
//! the fetches whose keys changed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{DashboardApi, FetchResult, WidgetData, WidgetRequest, execute};
use crate::clock::Clock;
use crate::config::ContextConfig;
use crate::error::{ContextError, Result};
use crate::query_key::{Completion, FetchTicket, FetchTracker, QueryKey, WidgetStatus};
use crate::reconcile::{AvailableOptions, OptionsReconciler, Reconciliation};
use crate::store::{QueryContextSnapshot, QueryContextStore};
use crate::time_range::{PresetId, TimeRange};
use crate::types::Dimension;
use crate::widget::{WidgetId, WidgetKind};
use crate::zoom::{BrushPolicy, BrushSelection, ZoomRange};

/// User interaction or data arrival, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// Custom absolute range.
    SetTimeRange {
        /// Start.
        start: DateTime<Utc>,
        /// End.
        end: DateTime<Utc>,
    },
    /// Preset relative to now.
    ApplyPreset {
        /// Preset id.
        preset: PresetId,
    },
    /// Dropdown selection; `null` or `""` clears.
    SetFilter {
        /// Dimension.
        dimension: Dimension,
        /// New value.
        #[serde(default)]
        value: Option<String>,
    },
    /// Clears one filter.
    ClearFilter {
        /// Dimension.
        dimension: Dimension,
    },
    /// Clears every filter and the drill-down trail.
    ClearAllFilters,
    /// Chart click on a specific dimension value.
    DrillDown {
        /// Dimension.
        dimension: Dimension,
        /// Clicked value.
        value: String,
    },
    /// Chart click that drills into the next hierarchy level.
    DrillNext {
        /// Clicked value.
        value: String,
    },
    /// Breadcrumb click.
    DrillUp {
        /// Level to return to.
        level: usize,
    },
    /// Breadcrumb root click.
    ResetDrilldown,
    /// Shared zoom.
    SetZoom {
        /// Lower bound.
        #[serde(default)]
        min: Option<DateTime<Utc>>,
        /// Upper bound.
        #[serde(default)]
        max: Option<DateTime<Utc>>,
    },
    /// Removes the shared zoom.
    ClearZoom,
    /// Chart brush drag.
    Brush {
        /// Lower bound.
        #[serde(default)]
        min: Option<DateTime<Utc>>,
        /// Upper bound.
        #[serde(default)]
        max: Option<DateTime<Utc>>,
    },
    /// Commits the brush into the shared zoom, if the policy allows it.
    ApplyBrush,
    /// Drops the brush.
    ClearBrush,
    /// Candidate lists received outside a widget fetch.
    OptionsLoaded {
        /// Candidates.
        options: AvailableOptions,
    },
}

impl DashboardEvent {
    /// Wire name of the event type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetTimeRange { .. } => "set_time_range",
            Self::ApplyPreset { .. } => "apply_preset",
            Self::SetFilter { .. } => "set_filter",
            Self::ClearFilter { .. } => "clear_filter",
            Self::ClearAllFilters => "clear_all_filters",
            Self::DrillDown { .. } => "drill_down",
            Self::DrillNext { .. } => "drill_next",
            Self::DrillUp { .. } => "drill_up",
            Self::ResetDrilldown => "reset_drilldown",
            Self::SetZoom { .. } => "set_zoom",
            Self::ClearZoom => "clear_zoom",
            Self::Brush { .. } => "brush",
            Self::ApplyBrush => "apply_brush",
            Self::ClearBrush => "clear_brush",
            Self::OptionsLoaded { .. } => "options_loaded",
        }
    }
}

/// A fetch ready to be sent.
#[derive(Debug, Clone)]
pub struct PendingFetch {
    /// Ticket to settle the fetch with.
    pub ticket: FetchTicket,
    /// Request parameters.
    pub request: WidgetRequest,
}

/// Counters from one [`Dashboard::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Fetch rounds run.
    pub rounds: usize,
    /// Fetches issued.
    pub issued: usize,
    /// Responses applied.
    pub ready: usize,
    /// Fetches that failed.
    pub failed: usize,
    /// Responses dropped as stale.
    pub discarded: usize,
    /// Filter changes made by reconciliation.
    pub reconciled: usize,
    /// Whether fetches were still pending when the round limit was hit.
    pub exhausted: bool,
}

#[derive(Debug)]
struct WidgetSlot {
    kind: WidgetKind,
    tracker: FetchTracker,
    data: Option<WidgetData>,
}

/// One dashboard session.
#[derive(Debug)]
pub struct Dashboard {
    config: ContextConfig,
    store: QueryContextStore,
    reconciler: OptionsReconciler,
    brush: BrushSelection,
    options: AvailableOptions,
    widgets: BTreeMap<WidgetId, WidgetSlot>,
}

impl Dashboard {
    /// Creates a dashboard with no widgets.
    pub fn new(config: ContextConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = QueryContextStore::new(&config, clock)?;
        let reconciler = OptionsReconciler::new(config.mandatory_defaults.iter().copied());
        Ok(Self {
            config,
            store,
            reconciler,
            brush: BrushSelection::default(),
            options: AvailableOptions::default(),
            widgets: BTreeMap::new(),
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &QueryContextStore {
        &self.store
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<QueryContextSnapshot> {
        self.store.snapshot()
    }

    /// Receiver that observes every committed snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<QueryContextSnapshot>> {
        self.store.subscribe()
    }

    /// Chart-local brush.
    #[must_use]
    pub fn brush(&self) -> &BrushSelection {
        &self.brush
    }

    /// Latest candidate lists per dimension.
    #[must_use]
    pub fn options(&self) -> &AvailableOptions {
        &self.options
    }

    /// Value a dropdown for `dimension` should show as selected.
    #[must_use]
    pub fn display_value(&self, dimension: Dimension) -> Option<&str> {
        let snapshot = self.store.snapshot();
        let value = snapshot
            .filters()
            .display_value(dimension, self.options.candidates(dimension))?;
        self.options
            .candidates(dimension)?
            .iter()
            .find(|c| c.as_str() == value)
            .map(String::as_str)
    }

    /// Adds a widget. Its first fetch becomes pending immediately.
    pub fn register_widget(&mut self, id: WidgetId, kind: WidgetKind) -> Result<()> {
        kind.validate()?;
        if self.widgets.contains_key(&id) {
            return Err(ContextError::DuplicateWidget(id.to_string()));
        }
        let mut tracker = FetchTracker::new(id.clone());
        tracker.observe(QueryKey::derive(&self.store.snapshot(), &kind.deps()));
        debug!(widget = %id, ?kind, "widget registered");
        self.widgets.insert(
            id,
            WidgetSlot {
                kind,
                tracker,
                data: None,
            },
        );
        Ok(())
    }

    /// Registered widgets in id order.
    pub fn widgets(&self) -> impl Iterator<Item = (&WidgetId, &WidgetKind, &WidgetStatus)> {
        self.widgets
            .iter()
            .map(|(id, slot)| (id, &slot.kind, slot.tracker.status()))
    }

    /// Display state of one widget.
    #[must_use]
    pub fn widget_status(&self, id: &WidgetId) -> Option<&WidgetStatus> {
        self.widgets.get(id).map(|slot| slot.tracker.status())
    }

    /// Current query key of one widget.
    #[must_use]
    pub fn widget_key(&self, id: &WidgetId) -> Option<&QueryKey> {
        self.widgets.get(id).and_then(|slot| slot.tracker.current())
    }

    /// Last data accepted by one widget.
    #[must_use]
    pub fn widget_data(&self, id: &WidgetId) -> Option<&WidgetData> {
        self.widgets.get(id).and_then(|slot| slot.data.as_ref())
    }

    /// Applies one event and returns the resulting snapshot.
    ///
    /// A rejected event leaves the dashboard unchanged.
    pub fn dispatch(&mut self, event: DashboardEvent) -> Result<Arc<QueryContextSnapshot>> {
        debug!(event = event.name(), "dispatch");
        let snapshot = match event {
            DashboardEvent::SetTimeRange { start, end } => {
                self.store.set_time_range(TimeRange::new(start, end)?)
            }
            DashboardEvent::ApplyPreset { preset } => self.store.apply_preset(preset)?,
            DashboardEvent::SetFilter { dimension, value } => {
                self.store.set_filter(dimension, value.as_deref())
            }
            DashboardEvent::ClearFilter { dimension } => self.store.clear_filter(dimension),
            DashboardEvent::ClearAllFilters => {
                self.store.clear_all_filters();
                self.reconciler.rearm_all();
                // Cached lists were fetched under the old filters. They are a
                // subset of the unfiltered candidates, so a default taken from
                // them stays valid when the options widgets refetch.
                let options = self.options.clone();
                self.reconcile(&options);
                self.store.snapshot()
            }
            DashboardEvent::DrillDown { dimension, value } => {
                self.store.drill_down(dimension, &value)?
            }
            DashboardEvent::DrillNext { value } => self.store.drill_next(&value)?,
            DashboardEvent::DrillUp { level } => self.store.drill_up(level)?,
            DashboardEvent::ResetDrilldown => self.store.reset_drilldown(),
            DashboardEvent::SetZoom { min, max } => self.store.set_zoom(ZoomRange::new(min, max)?),
            DashboardEvent::ClearZoom => self.store.clear_zoom(),
            DashboardEvent::Brush { min, max } => {
                self.brush.drag(ZoomRange::new(min, max)?);
                self.store.snapshot()
            }
            DashboardEvent::ApplyBrush => self.apply_brush(),
            DashboardEvent::ClearBrush => {
                self.brush.clear();
                self.store.snapshot()
            }
            DashboardEvent::OptionsLoaded { options } => {
                self.reconcile(&options);
                self.store.snapshot()
            }
        };
        self.observe_all();
        Ok(snapshot)
    }

    fn apply_brush(&mut self) -> Arc<QueryContextSnapshot> {
        match self.config.brush_policy {
            BrushPolicy::LocalOnly => {
                debug!("brush kept local to the chart");
                self.store.snapshot()
            }
            BrushPolicy::ApplyOnCommit => match self.brush.take() {
                Some(zoom) => self.store.set_zoom(zoom),
                None => self.store.snapshot(),
            },
        }
    }

    /// Runs the reconciler against fresh candidate lists and applies the
    /// result as one transition.
    pub fn reconcile(&mut self, options: &AvailableOptions) -> Reconciliation {
        self.options.merge(options);
        let snapshot = self.store.snapshot();
        let reconciliation = self.reconciler.reconcile(snapshot.filters(), options);
        if !reconciliation.is_empty() {
            self.store.apply_reconciliation(&reconciliation);
            info!(
                changes = reconciliation.changes().len(),
                "applied options reconciliation"
            );
        }
        self.observe_all();
        reconciliation
    }

    fn observe_all(&mut self) {
        let snapshot = self.store.snapshot();
        for slot in self.widgets.values_mut() {
            slot.tracker
                .observe(QueryKey::derive(&snapshot, &slot.kind.deps()));
        }
    }

    /// Starts a fetch for every widget whose current key is neither
    /// completed nor in flight.
    pub fn pending_fetches(&mut self) -> Vec<PendingFetch> {
        let snapshot = self.store.snapshot();
        self.widgets
            .values_mut()
            .filter_map(|slot| {
                let ticket = slot.tracker.begin()?;
                Some(PendingFetch {
                    ticket,
                    request: slot.kind.request(&snapshot),
                })
            })
            .collect()
    }

    /// Settles a fetch. Accepted options responses are reconciled against
    /// the filters; the returned reconciliation is empty for other widgets.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: FetchResult<WidgetData>,
    ) -> Result<Completion<Reconciliation>> {
        let slot = self
            .widgets
            .get_mut(&ticket.widget)
            .ok_or_else(|| ContextError::UnknownWidget(ticket.widget.to_string()))?;

        match slot.tracker.settle(ticket, result) {
            Completion::Ready(data) => {
                let fresh = match (&data, slot.kind.options_dimension()) {
                    (WidgetData::Options(options), Some(dimension)) => Some(options.only(dimension)),
                    _ => None,
                };
                slot.data = Some(data);
                let reconciliation = match fresh {
                    Some(options) => self.reconcile(&options),
                    None => Reconciliation::default(),
                };
                Ok(Completion::Ready(reconciliation))
            }
            Completion::Failed(err) => Ok(Completion::Failed(err)),
            Completion::Discarded => Ok(Completion::Discarded),
        }
    }

    /// Fetches until every widget is current or the round limit is reached.
    ///
    /// Fetches within a round run concurrently. Responses are applied in
    /// widget order once the round has finished; a reconciliation can make
    /// later responses of the same round stale.
    pub async fn refresh<A: DashboardApi>(&mut self, api: &A) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        for round in 1..=self.config.max_refresh_rounds {
            let pending = self.pending_fetches();
            if pending.is_empty() {
                break;
            }
            summary.rounds = round;
            summary.issued += pending.len();
            debug!(round, fetches = pending.len(), "refresh round");

            let results = join_all(pending.iter().map(|p| execute(api, &p.request))).await;
            for (fetch, result) in pending.into_iter().zip(results) {
                match self.complete(&fetch.ticket, result) {
                    Ok(Completion::Ready(reconciliation)) => {
                        summary.ready += 1;
                        summary.reconciled += reconciliation.changes().len();
                    }
                    Ok(Completion::Failed(_)) => summary.failed += 1,
                    Ok(Completion::Discarded) => summary.discarded += 1,
                    Err(err) => warn!(error = %err, "fetch completed for unregistered widget"),
                }
            }
        }

        summary.exhausted = self.widgets.values().any(|slot| slot.tracker.needs_fetch());
        if summary.exhausted {
            warn!(
                rounds = summary.rounds,
                "refresh stopped at round limit with fetches pending"
            );
        }
        summary
    }
}
