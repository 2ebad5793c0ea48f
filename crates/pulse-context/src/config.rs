//! Coordinator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::drilldown::{DrillHierarchy, DrilldownFilterPolicy};
use crate::error::{ContextError, Result};
use crate::time_range::{Preset, PresetId};
use crate::types::Dimension;
use crate::zoom::BrushPolicy;

/// Configuration for one dashboard's query context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Preset table offered by the time range picker.
    pub presets: Vec<Preset>,
    /// Preset applied when the store is created.
    pub default_preset: PresetId,
    /// Dimensions that receive the first candidate when unset.
    pub mandatory_defaults: Vec<Dimension>,
    /// Filter handling when drilling back up.
    pub drilldown_policy: DrilldownFilterPolicy,
    /// Whether chart brushes can write the shared zoom.
    pub brush_policy: BrushPolicy,
    /// Dimension order used by "drill into next level".
    pub hierarchy: DrillHierarchy,
    /// Upper bound on fetch rounds per refresh. A round can trigger another
    /// when options reconciliation changes filters.
    pub max_refresh_rounds: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            presets: Preset::builtins(),
            default_preset: PresetId::Last24Hours,
            mandatory_defaults: vec![Dimension::MetricName],
            drilldown_policy: DrilldownFilterPolicy::default(),
            brush_policy: BrushPolicy::default(),
            hierarchy: DrillHierarchy::default(),
            max_refresh_rounds: 4,
        }
    }
}

impl ContextConfig {
    /// Parses a JSON configuration and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ContextError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| ContextError::InvalidConfig {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }

    /// Replace the preset table.
    #[must_use]
    pub fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = presets;
        self
    }

    /// Set the preset applied at startup.
    #[must_use]
    pub const fn with_default_preset(mut self, preset: PresetId) -> Self {
        self.default_preset = preset;
        self
    }

    /// Replace the mandatory-default dimensions.
    #[must_use]
    pub fn with_mandatory_defaults(mut self, dimensions: Vec<Dimension>) -> Self {
        self.mandatory_defaults = dimensions;
        self
    }

    /// Set the drill-up filter policy.
    #[must_use]
    pub const fn with_drilldown_policy(mut self, policy: DrilldownFilterPolicy) -> Self {
        self.drilldown_policy = policy;
        self
    }

    /// Set the brush write-back policy.
    #[must_use]
    pub const fn with_brush_policy(mut self, policy: BrushPolicy) -> Self {
        self.brush_policy = policy;
        self
    }

    /// Replace the drill hierarchy.
    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: DrillHierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Set the refresh round limit.
    #[must_use]
    pub const fn with_max_refresh_rounds(mut self, rounds: usize) -> Self {
        self.max_refresh_rounds = rounds;
        self
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<()> {
        for (i, preset) in self.presets.iter().enumerate() {
            preset.duration()?;
            if self.presets[..i].iter().any(|p| p.id == preset.id) {
                return Err(ContextError::InvalidConfig {
                    reason: format!("preset {} listed twice", preset.id),
                });
            }
        }
        if !self.presets.iter().any(|p| p.id == self.default_preset) {
            return Err(ContextError::InvalidConfig {
                reason: format!("default preset {} is not in the preset table", self.default_preset),
            });
        }
        self.hierarchy.validate()?;
        if self.max_refresh_rounds == 0 {
            return Err(ContextError::InvalidConfig {
                reason: "max_refresh_rounds must be at least 1".into(),
            });
        }
        Ok(())
    }
}
