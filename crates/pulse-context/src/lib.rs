//! # pulse-context
//!
//! Shared query context for interactive analytics dashboards.
//!
//! One dashboard holds a time range, a set of categorical filters, a
//! drill-down trail and a chart zoom. Every widget derives its fetch
//! parameters from that context and refetches only when the slices it reads
//! change.
//!
//! ## Features
//!
//! - **Store**: single-writer snapshots with pure, idempotent transitions
//! - **Reconciliation**: stale dropdown selections are cleared when fresh
//!   candidate lists arrive; mandatory dimensions get a default once
//! - **Drill-down**: breadcrumb trail over the filters with a named policy
//!   for drilling back up
//! - **Query keys**: per-widget keys, fetch tickets and stale response
//!   discarding
//! - **Backend contract**: typed requests and the [`DashboardApi`] seam
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pulse_context::{
//!     ContextConfig, Dashboard, DashboardEvent, Dimension, StaticApi, SystemClock, WidgetKind,
//! };
//!
//! # async fn run() -> pulse_context::Result<()> {
//! let mut dashboard = Dashboard::new(ContextConfig::default(), Arc::new(SystemClock))?;
//! dashboard.register_widget(
//!     "by-service".into(),
//!     WidgetKind::Aggregated {
//!         group_by: Dimension::Service,
//!         aggregation: Default::default(),
//!     },
//! )?;
//!
//! dashboard.dispatch(DashboardEvent::SetFilter {
//!     dimension: Dimension::Region,
//!     value: Some("us-east-1".into()),
//! })?;
//!
//! let api = StaticApi::default();
//! let summary = dashboard.refresh(&api).await;
//! println!("{} fetches issued", summary.issued);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod drilldown;
pub mod error;
pub mod filters;
pub mod query_key;
pub mod reconcile;
pub mod store;
pub mod time_range;
pub mod types;
pub mod widget;
pub mod zoom;

// Re-export main types
pub use api::{
    AggregatedRequest, AggregatedResponse, DashboardApi, Endpoint, FetchResult, MetricsRequest,
    MetricsResponse, OptionsRequest, StaticApi, TimeseriesRequest, TimeseriesResponse,
    WidgetData, WidgetRequest,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ContextConfig;
pub use dashboard::{Dashboard, DashboardEvent, PendingFetch, RefreshSummary};
pub use drilldown::{
    Breadcrumb, BreadcrumbLabel, DrillHierarchy, DrilldownFilterPolicy, DrilldownNavigator,
    DrilldownState,
};
pub use error::{ContextError, FetchError, Result};
pub use filters::FilterMap;
pub use query_key::{
    Completion, FetchTicket, FetchTracker, FilterScope, QueryKey, WidgetDeps, WidgetStatus,
};
pub use reconcile::{AvailableOptions, ChangeReason, FilterChange, OptionsReconciler, Reconciliation};
pub use store::{QueryContextSnapshot, QueryContextStore};
pub use time_range::{Preset, PresetId, TimeRange, TimeRangeController};
pub use types::{Aggregation, Dimension, Interval};
pub use widget::{WidgetId, WidgetKind};
pub use zoom::{BrushPolicy, BrushSelection, ZoomRange};
