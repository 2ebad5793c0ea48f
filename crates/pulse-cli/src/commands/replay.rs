//! Replay command implementation.
//!
//! Builds a dashboard from a script, applies its events in order and
//! reports the resulting query context. With fixtures, widgets are
//! refreshed against them after registration and after every event, so
//! options reconciliation takes part in the replay.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use pulse_context::{
    Clock, ContextConfig, Dashboard, DashboardEvent, FixedClock, StaticApi, SystemClock,
    WidgetId, WidgetKind,
};

use crate::cli::ReplayArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, ReplayReport, StateReport, StepReport};

/// A widget declared by a script.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptWidget {
    /// Widget id.
    pub id: WidgetId,
    /// What the widget shows.
    #[serde(flatten)]
    pub kind: WidgetKind,
}

/// Replay script: widgets to register, then events to apply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    /// Widgets, registered in order.
    pub widgets: Vec<ScriptWidget>,
    /// Events, applied in order.
    pub events: Vec<DashboardEvent>,
}

impl Script {
    /// Parses a script from JSON.
    ///
    /// # Errors
    ///
    /// Returns the parser error if the JSON does not describe a script.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn read(kind: &'static str, path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::Input {
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn load_script(path: &Path) -> Result<Script, CliError> {
    Script::from_json(&read("script", path)?).map_err(|e| CliError::Input {
        kind: "script",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn load_fixtures(path: &Path) -> Result<StaticApi, CliError> {
    StaticApi::from_json(&read("fixture", path)?).map_err(|e| CliError::Input {
        kind: "fixture",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Replay command executor.
pub struct ReplayCommand<'a> {
    config: &'a ContextConfig,
}

impl<'a> ReplayCommand<'a> {
    /// Create a new replay command.
    #[must_use]
    pub const fn new(config: &'a ContextConfig) -> Self {
        Self { config }
    }

    /// Execute the replay command.
    ///
    /// # Errors
    ///
    /// Returns an error if an input file cannot be read or parsed, if a
    /// widget is invalid, if an event is rejected in strict mode, or if
    /// output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &ReplayArgs,
    ) -> Result<(), CliError> {
        let script = load_script(&args.script)?;
        let fixtures = args.fixtures.as_deref().map(load_fixtures).transpose()?;
        let clock: Arc<dyn Clock> = match args.now {
            Some(now) => Arc::new(FixedClock::new(now)),
            None => Arc::new(SystemClock),
        };

        let report = self
            .replay(script, fixtures.as_ref(), clock, args.strict)
            .await?;
        format.write(writer, &report)?;
        Ok(())
    }

    /// Replays `script` and reports every step.
    ///
    /// Rejected events are recorded and skipped, unless `strict` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a widget cannot be registered, or on the first
    /// rejected event in strict mode.
    pub async fn replay(
        &self,
        script: Script,
        fixtures: Option<&StaticApi>,
        clock: Arc<dyn Clock>,
        strict: bool,
    ) -> Result<ReplayReport, CliError> {
        let mut dashboard = Dashboard::new(self.config.clone(), clock)?;
        for widget in script.widgets {
            dashboard.register_widget(widget.id, widget.kind)?;
        }

        let initial_refresh = match fixtures {
            Some(api) => Some(dashboard.refresh(api).await),
            None => None,
        };

        let mut steps = Vec::with_capacity(script.events.len());
        for (index, event) in script.events.into_iter().enumerate() {
            let step = index + 1;
            let name = event.name();

            let error = match dashboard.dispatch(event) {
                Ok(_) => None,
                Err(source) if strict => {
                    return Err(CliError::Rejected {
                        step,
                        event: name,
                        source,
                    });
                }
                Err(err) => {
                    warn!(step, event = name, error = %err, "event rejected");
                    Some(err.to_string())
                }
            };

            let refresh = match fixtures {
                Some(api) => Some(dashboard.refresh(api).await),
                None => None,
            };

            steps.push(StepReport {
                step,
                event: name,
                revision: dashboard.snapshot().revision(),
                error,
                refresh,
            });
        }

        let state = StateReport::capture(&dashboard);
        info!(
            steps = steps.len(),
            revision = state.revision,
            "replay finished"
        );

        Ok(ReplayReport {
            initial_refresh,
            steps,
            state,
        })
    }
}
