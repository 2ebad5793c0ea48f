//! # pulse-cli
//!
//! Command-line front end for the Pulse query-context coordinator.
//!
//! Provides commands for:
//! - Replaying scripted dashboard interactions, optionally against canned
//!   backend responses
//! - Listing time range presets
//! - Printing the effective configuration
//!
//! # Replay scripts
//!
//! ```text
//! {
//!   "widgets": [
//!     {"id": "metrics-dropdown", "kind": "options", "dimension": "metric_name"},
//!     {"id": "by-service", "kind": "aggregated", "group_by": "service"}
//!   ],
//!   "events": [
//!     {"type": "apply_preset", "preset": "last_1h"},
//!     {"type": "drill_down", "dimension": "service", "value": "checkout-api"}
//!   ]
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, PresetsArgs, ReplayArgs};
pub use error::CliError;
pub use output::OutputFormat;
