//! Chart zoom.
//!
//! The shared [`ZoomRange`] lives in the store and feeds the time-series
//! fetch. A brush drag on the chart produces a [`BrushSelection`] that stays
//! local to the chart; whether it ever reaches the shared zoom is decided by
//! [`BrushPolicy`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContextError, Result};

/// Sub-selection of the time axis. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawZoom")]
pub struct ZoomRange {
    min: Option<DateTime<Utc>>,
    max: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawZoom {
    #[serde(default)]
    min: Option<DateTime<Utc>>,
    #[serde(default)]
    max: Option<DateTime<Utc>>,
}

impl TryFrom<RawZoom> for ZoomRange {
    type Error = ContextError;

    fn try_from(raw: RawZoom) -> Result<Self> {
        Self::new(raw.min, raw.max)
    }
}

impl ZoomRange {
    /// Creates a zoom range. Fails if both bounds are set and `min > max`.
    pub fn new(min: Option<DateTime<Utc>>, max: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ContextError::InvalidZoom { min: lo, max: hi });
            }
        }
        Ok(Self { min, max })
    }

    /// The unbounded zoom.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> Option<DateTime<Utc>> {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> Option<DateTime<Utc>> {
        self.max
    }

    /// Whether neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Whether a brush selection may be written back into the shared zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushPolicy {
    /// The brush never leaves the chart.
    #[default]
    LocalOnly,
    /// An explicit apply writes the brush into the shared zoom.
    ApplyOnCommit,
}

/// Transient, chart-local brush selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrushSelection {
    selection: Option<ZoomRange>,
}

impl BrushSelection {
    /// Current selection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<&ZoomRange> {
        self.selection.as_ref()
    }

    /// Replaces the selection while dragging.
    pub fn drag(&mut self, range: ZoomRange) {
        self.selection = Some(range);
    }

    /// Drops the selection.
    pub fn clear(&mut self) {
        self.selection = None;
    }

    /// Removes and returns the selection.
    pub fn take(&mut self) -> Option<ZoomRange> {
        self.selection.take()
    }
}
