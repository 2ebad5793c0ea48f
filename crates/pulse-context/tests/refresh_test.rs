//! Integration tests for the fetch/reconcile loop.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use pulse_context::{
    Aggregation, AggregatedResponse, AvailableOptions, Completion, ContextConfig, Dashboard,
    DashboardEvent, Dimension, Endpoint, FixedClock, Interval, StaticApi, TimeseriesResponse,
    WidgetData, WidgetId, WidgetKind, WidgetStatus,
};
use pulse_context::api::{
    AggregatedPoint, MetricRecord, MetricsResponse, ResponseWindow, TimeseriesPoint,
};

// ==================== Helper Functions ====================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn make_dashboard(config: ContextConfig) -> Dashboard {
    let mut dashboard = Dashboard::new(config, Arc::new(FixedClock::new(t0()))).unwrap();
    dashboard
        .register_widget(
            "bar".into(),
            WidgetKind::Aggregated {
                group_by: Dimension::Service,
                aggregation: Aggregation::Avg,
            },
        )
        .unwrap();
    dashboard
        .register_widget(
            "metric-options".into(),
            WidgetKind::Options {
                dimension: Dimension::MetricName,
            },
        )
        .unwrap();
    dashboard
        .register_widget(
            "service-options".into(),
            WidgetKind::Options {
                dimension: Dimension::Service,
            },
        )
        .unwrap();
    dashboard
        .register_widget("series".into(), WidgetKind::Timeseries { interval: None })
        .unwrap();
    dashboard
}

fn aggregated() -> AggregatedResponse {
    AggregatedResponse {
        data: vec![AggregatedPoint {
            dimension: "checkout-api".into(),
            value: 120.5,
            count: 42,
        }],
        group_by: Dimension::Service,
        metric: "latency".into(),
        aggregation: Aggregation::Avg,
    }
}

fn timeseries() -> TimeseriesResponse {
    TimeseriesResponse {
        data: vec![TimeseriesPoint {
            timestamp: t0().naive_utc(),
            value: 98.0,
            min: Some(12.0),
            max: Some(300.0),
            count: Some(10),
        }],
        interval: Interval::FifteenMinutes,
        metric: "latency".into(),
    }
}

fn metrics(region: &str) -> MetricsResponse {
    MetricsResponse {
        metrics: vec![MetricRecord {
            id: 1,
            timestamp: t0().naive_utc(),
            service: "checkout-api".into(),
            endpoint: "/pay".into(),
            region: region.into(),
            environment: "production".into(),
            metric_name: "latency".into(),
            value: 87.0,
            status: "success".into(),
        }],
        count: 1,
        time_range: ResponseWindow {
            start: t0().naive_utc() - chrono::Duration::hours(24),
            end: t0().naive_utc(),
        },
    }
}

fn options() -> AvailableOptions {
    AvailableOptions::default()
        .with(Dimension::Service, strings(&["checkout-api", "search-api"]))
        .with(Dimension::MetricName, strings(&["latency", "error_rate"]))
}

fn full_api() -> StaticApi {
    StaticApi::default()
        .with_options(options())
        .with_aggregated(aggregated())
        .with_timeseries(timeseries())
}

// ==================== Refresh Loop Tests ====================

#[tokio::test]
async fn test_refresh_settles_after_metric_default() {
    let mut dashboard = make_dashboard(ContextConfig::default());
    let api = full_api();

    let summary = dashboard.refresh(&api).await;

    // Round one: the metric default changes the filters, so the two widgets
    // settled after it see a superseded key. Round two refetches them and
    // the bar chart.
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.issued, 7);
    assert_eq!(summary.ready, 5);
    assert_eq!(summary.discarded, 2);
    assert_eq!(summary.reconciled, 1);
    assert!(!summary.exhausted);
    assert_eq!(api.calls().len(), 7);

    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.filters().get(Dimension::MetricName), Some("latency"));
    assert!(
        dashboard
            .widgets()
            .all(|(_, _, status)| *status == WidgetStatus::Ready)
    );

    let again = dashboard.refresh(&api).await;
    assert_eq!(again.issued, 0);
}

#[tokio::test]
async fn test_refresh_stops_at_round_limit() {
    let mut dashboard = make_dashboard(ContextConfig::default().with_max_refresh_rounds(1));

    let summary = dashboard.refresh(&full_api()).await;

    assert_eq!(summary.rounds, 1);
    assert!(summary.exhausted);
}

#[tokio::test]
async fn test_refresh_clears_stale_selection() {
    let mut dashboard = make_dashboard(ContextConfig::default());
    dashboard
        .dispatch(DashboardEvent::SetFilter {
            dimension: Dimension::Service,
            value: Some("retired-api".into()),
        })
        .unwrap();

    dashboard.refresh(&full_api()).await;

    assert_eq!(dashboard.snapshot().filters().get(Dimension::Service), None);
}

#[tokio::test]
async fn test_fetch_error_is_isolated() {
    let mut dashboard = make_dashboard(ContextConfig::default().with_mandatory_defaults(vec![]));
    let api = StaticApi::default()
        .with_options(options())
        .with_aggregated(aggregated());

    let summary = dashboard.refresh(&api).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.ready, 3);
    assert!(matches!(
        dashboard.widget_status(&WidgetId::new("series")),
        Some(WidgetStatus::Failed(_))
    ));
    assert_eq!(
        dashboard.widget_status(&WidgetId::new("bar")),
        Some(&WidgetStatus::Ready)
    );
    assert_eq!(dashboard.snapshot().revision(), 0);

    // The failed key is not retried until the context changes.
    assert_eq!(dashboard.refresh(&api).await.issued, 0);
    assert!(api.calls().contains(&Endpoint::Timeseries));
}

// ==================== Stale Response Tests ====================

#[test]
fn test_out_of_order_response_is_discarded() {
    let mut dashboard = Dashboard::new(
        ContextConfig::default(),
        Arc::new(FixedClock::new(t0())),
    )
    .unwrap();
    dashboard
        .register_widget("table".into(), WidgetKind::Metrics)
        .unwrap();

    let first = dashboard.pending_fetches().remove(0);
    dashboard
        .dispatch(DashboardEvent::SetFilter {
            dimension: Dimension::Region,
            value: Some("eu-west-1".into()),
        })
        .unwrap();
    let second = dashboard.pending_fetches().remove(0);

    let newer = WidgetData::Metrics(metrics("eu-west-1"));
    let older = WidgetData::Metrics(metrics("us-east-1"));

    let done = dashboard.complete(&second.ticket, Ok(newer.clone())).unwrap();
    assert!(matches!(done, Completion::Ready(_)));
    let late = dashboard.complete(&first.ticket, Ok(older)).unwrap();
    assert_eq!(late, Completion::Discarded);

    assert_eq!(dashboard.widget_data(&WidgetId::new("table")), Some(&newer));
}

#[test]
fn test_unknown_ticket_is_rejected() {
    let mut other = make_dashboard(ContextConfig::default());
    let ticket = other.pending_fetches().remove(0).ticket;

    let mut dashboard = Dashboard::new(
        ContextConfig::default(),
        Arc::new(FixedClock::new(t0())),
    )
    .unwrap();
    assert!(dashboard.complete(&ticket, Ok(WidgetData::Aggregated(aggregated()))).is_err());
}

// ==================== Subscription Tests ====================

#[tokio::test]
async fn test_subscribers_follow_dispatch() {
    let mut dashboard = make_dashboard(ContextConfig::default());
    let mut updates = dashboard.subscribe();

    dashboard
        .dispatch(DashboardEvent::DrillDown {
            dimension: Dimension::Service,
            value: "checkout-api".into(),
        })
        .unwrap();

    updates.changed().await.unwrap();
    let seen = updates.borrow_and_update().clone();
    assert_eq!(seen.drilldown().level(), 1);
    assert_eq!(seen.revision(), dashboard.snapshot().revision());
}
