//! Presets command implementation.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulse_context::{Clock, ContextConfig, FixedClock, SystemClock, TimeRangeController};

use crate::cli::PresetsArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, PresetList, PresetRow};

/// Presets command executor.
pub struct PresetsCommand<'a> {
    config: &'a ContextConfig,
}

impl<'a> PresetsCommand<'a> {
    /// Create a new presets command.
    #[must_use]
    pub const fn new(config: &'a ContextConfig) -> Self {
        Self { config }
    }

    /// Execute the presets command.
    ///
    /// # Errors
    ///
    /// Returns an error if a preset cannot be resolved or output fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &PresetsArgs,
    ) -> Result<(), CliError> {
        let list = self.list(args.now)?;
        format.write(writer, &list)?;
        Ok(())
    }

    /// Resolves every configured preset against `now`, or the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if a preset duration is out of range.
    pub fn list(&self, now: Option<DateTime<Utc>>) -> Result<PresetList, CliError> {
        let clock: Arc<dyn Clock> = match now {
            Some(now) => Arc::new(FixedClock::new(now)),
            None => Arc::new(SystemClock),
        };
        let controller = TimeRangeController::new(self.config.presets.clone(), clock);

        let presets = controller
            .presets()
            .iter()
            .map(|preset| {
                let range = controller.resolve(preset.id)?;
                Ok(PresetRow {
                    id: preset.id.as_str().to_string(),
                    label: preset.id.label().to_string(),
                    seconds: preset.seconds,
                    start: range.start(),
                    end: range.end(),
                    default: preset.id == self.config.default_preset,
                })
            })
            .collect::<Result<Vec<_>, CliError>>()?;

        Ok(PresetList { presets })
    }
}
