//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use pulse_context::{
    ContextConfig, Dashboard, Dimension, RefreshSummary, WidgetKind,
};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

fn dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn time(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
}

/// Short description of a widget kind.
#[must_use]
pub fn describe_kind(kind: &WidgetKind) -> String {
    match kind {
        WidgetKind::Aggregated {
            group_by,
            aggregation,
        } => format!("aggregated({group_by}, {aggregation})"),
        WidgetKind::Timeseries { interval: Some(i) } => format!("timeseries({i})"),
        WidgetKind::Timeseries { interval: None } => "timeseries(auto)".to_string(),
        WidgetKind::Metrics => "metrics".to_string(),
        WidgetKind::Options { dimension } => format!("options({dimension})"),
    }
}

/// One filter dimension.
#[derive(Debug, Clone, Serialize)]
pub struct FilterRow {
    /// Dimension.
    pub dimension: Dimension,
    /// Stored value.
    pub value: Option<String>,
    /// Value a dropdown would show as selected.
    pub shown: Option<String>,
}

/// One widget.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetRow {
    /// Widget id.
    pub id: String,
    /// Kind description.
    pub kind: String,
    /// Display state.
    pub status: String,
    /// Query key fingerprint.
    pub key: Option<String>,
}

/// Full dashboard state.
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    /// Snapshot revision.
    pub revision: u64,
    /// Range start.
    pub start: DateTime<Utc>,
    /// Range end.
    pub end: DateTime<Utc>,
    /// Preset label or `custom`.
    pub preset: String,
    /// Every dimension.
    pub filters: Vec<FilterRow>,
    /// Breadcrumb labels, root first.
    pub breadcrumbs: Vec<String>,
    /// Zoom lower bound.
    pub zoom_min: Option<DateTime<Utc>>,
    /// Zoom upper bound.
    pub zoom_max: Option<DateTime<Utc>>,
    /// Registered widgets.
    pub widgets: Vec<WidgetRow>,
}

impl StateReport {
    /// Captures the state of `dashboard`.
    #[must_use]
    pub fn capture(dashboard: &Dashboard) -> Self {
        let snapshot = dashboard.snapshot();
        let range = snapshot.time_range();

        let filters = snapshot
            .filters()
            .iter()
            .map(|(dimension, value)| FilterRow {
                dimension,
                value: value.map(str::to_string),
                shown: dashboard.display_value(dimension).map(str::to_string),
            })
            .collect();

        let widgets = dashboard
            .widgets()
            .map(|(id, kind, status)| WidgetRow {
                id: id.to_string(),
                kind: describe_kind(kind),
                status: status.to_string(),
                key: dashboard.widget_key(id).map(|k| k.fingerprint()),
            })
            .collect();

        Self {
            revision: snapshot.revision(),
            start: range.start(),
            end: range.end(),
            preset: range.preset_label().to_string(),
            filters,
            breadcrumbs: snapshot
                .drilldown()
                .labels()
                .into_iter()
                .map(|l| l.label)
                .collect(),
            zoom_min: snapshot.zoom().min(),
            zoom_max: snapshot.zoom().max(),
            widgets,
        }
    }
}

impl TableDisplay for StateReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Query Context (revision {})", self.revision)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Time Range:  {} ({})", self.preset, self.start.to_rfc3339())?;
        writeln!(writer, "             to {}", self.end.to_rfc3339())?;
        writeln!(
            writer,
            "Zoom:        {} .. {}",
            time(self.zoom_min),
            time(self.zoom_max)
        )?;
        writeln!(writer, "Drill-down:  {}", self.breadcrumbs.join(" > "))?;
        writeln!(writer)?;

        writeln!(writer, "{:<12}  {:<24}  {:<24}", "DIMENSION", "VALUE", "SHOWN")?;
        writeln!(writer, "{}", "─".repeat(64))?;
        for row in &self.filters {
            writeln!(
                writer,
                "{:<12}  {:<24}  {:<24}",
                row.dimension.as_str(),
                truncate(dash(row.value.as_deref()), 24),
                truncate(dash(row.shown.as_deref()), 24)
            )?;
        }

        if !self.widgets.is_empty() {
            writeln!(writer)?;
            writeln!(
                writer,
                "{:<20}  {:<28}  {:<10}  {:<20}",
                "WIDGET", "KIND", "STATUS", "KEY"
            )?;
            writeln!(writer, "{}", "─".repeat(84))?;
            for widget in &self.widgets {
                writeln!(
                    writer,
                    "{:<20}  {:<28}  {:<10}  {:<20}",
                    truncate(&widget.id, 20),
                    truncate(&widget.kind, 28),
                    truncate(&widget.status, 10),
                    truncate(dash(widget.key.as_deref()), 20)
                )?;
            }
        }
        Ok(())
    }
}

/// Result of one replayed event.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// One-based step number.
    pub step: usize,
    /// Event type.
    pub event: &'static str,
    /// Revision after the step.
    pub revision: u64,
    /// Rejection message, if the event was rejected.
    pub error: Option<String>,
    /// Refresh counters, if fixtures were given.
    pub refresh: Option<RefreshSummary>,
}

/// Output of `replay`.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Refresh before the first event, if fixtures were given.
    pub initial_refresh: Option<RefreshSummary>,
    /// One entry per event.
    pub steps: Vec<StepReport>,
    /// State after the last event.
    pub state: StateReport,
}

fn describe_refresh(summary: Option<&RefreshSummary>) -> String {
    summary.map_or_else(String::new, |s| {
        let mut text = format!(
            "fetched {} ready {} failed {} discarded {}",
            s.issued, s.ready, s.failed, s.discarded
        );
        if s.reconciled > 0 {
            text.push_str(&format!(" reconciled {}", s.reconciled));
        }
        if s.exhausted {
            text.push_str(" (round limit)");
        }
        text
    })
}

impl TableDisplay for ReplayReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if let Some(initial) = &self.initial_refresh {
            writeln!(writer, "initial: {}", describe_refresh(Some(initial)))?;
        }
        if self.steps.is_empty() {
            writeln!(writer, "No events replayed")?;
        } else {
            writeln!(
                writer,
                "{:>4}  {:<18}  {:>8}  {}",
                "STEP", "EVENT", "REVISION", "RESULT"
            )?;
            writeln!(writer, "{}", "─".repeat(72))?;
            for step in &self.steps {
                let result = step.error.as_ref().map_or_else(
                    || describe_refresh(step.refresh.as_ref()),
                    |e| format!("rejected: {e}"),
                );
                writeln!(
                    writer,
                    "{:>4}  {:<18}  {:>8}  {}",
                    step.step, step.event, step.revision, result
                )?;
            }
        }
        writeln!(writer)?;
        self.state.write_table(writer)
    }
}

/// One preset resolved against the clock.
#[derive(Debug, Clone, Serialize)]
pub struct PresetRow {
    /// Preset id.
    pub id: String,
    /// Label.
    pub label: String,
    /// Width in seconds.
    pub seconds: u64,
    /// Resolved start.
    pub start: DateTime<Utc>,
    /// Resolved end.
    pub end: DateTime<Utc>,
    /// Whether this is the startup preset.
    pub default: bool,
}

/// Output of `presets`.
#[derive(Debug, Clone, Serialize)]
pub struct PresetList {
    /// Presets in table order.
    pub presets: Vec<PresetRow>,
}

impl TableDisplay for PresetList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.presets.is_empty() {
            writeln!(writer, "No presets configured")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<10}  {:<16}  {:>8}  {:<25}  {:<25}",
            "ID", "LABEL", "SECONDS", "START", "END"
        )?;
        writeln!(writer, "{}", "─".repeat(92))?;
        for preset in &self.presets {
            let marker = if preset.default { "*" } else { "" };
            writeln!(
                writer,
                "{:<10}  {:<16}  {:>8}  {:<25}  {:<25}",
                format!("{}{marker}", preset.id),
                preset.label,
                preset.seconds,
                preset.start.to_rfc3339(),
                preset.end.to_rfc3339()
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "* default preset")?;
        Ok(())
    }
}

/// Output of `config`.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ConfigReport {
    /// Effective configuration.
    pub config: ContextConfig,
}

impl TableDisplay for ConfigReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let config = &self.config;
        let mandatory: Vec<&str> = config.mandatory_defaults.iter().map(|d| d.as_str()).collect();
        let hierarchy: Vec<&str> = config.hierarchy.levels().iter().map(|d| d.as_str()).collect();
        let presets: Vec<&str> = config.presets.iter().map(|p| p.id.as_str()).collect();

        writeln!(writer, "Configuration")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Default Preset:     {}", config.default_preset)?;
        writeln!(writer, "Presets:            {}", presets.join(", "))?;
        writeln!(writer, "Mandatory Defaults: {}", mandatory.join(", "))?;
        writeln!(writer, "Drill Hierarchy:    {}", hierarchy.join(" > "))?;
        writeln!(writer, "Drill-up Policy:    {:?}", config.drilldown_policy)?;
        writeln!(writer, "Brush Policy:       {:?}", config.brush_policy)?;
        writeln!(writer, "Refresh Rounds:     {}", config.max_refresh_rounds)?;
        Ok(())
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
