//! Config command implementation.

use std::io::Write;

use pulse_context::ContextConfig;

use crate::error::CliError;
use crate::output::{ConfigReport, OutputFormat};

/// Config command executor.
pub struct ConfigCommand<'a> {
    config: &'a ContextConfig,
}

impl<'a> ConfigCommand<'a> {
    /// Create a new config command.
    #[must_use]
    pub const fn new(config: &'a ContextConfig) -> Self {
        Self { config }
    }

    /// Execute the config command.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let report = ConfigReport {
            config: self.config.clone(),
        };
        format.write(writer, &report)
    }
}
