//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`replay`] - Replay dashboard events against canned responses
//! - [`presets`] - Time range presets
//! - [`config`] - Effective configuration

pub mod config;
pub mod presets;
pub mod replay;

pub use config::ConfigCommand;
pub use presets::PresetsCommand;
pub use replay::{ReplayCommand, Script, ScriptWidget};
