//! Time range selection.
//!
//! A [`TimeRange`] is always absolute. Presets such as `last_1h` are
//! resolved to concrete instants once, at selection time, by
//! [`TimeRangeController::resolve`]; they are not re-evaluated as the clock
//! moves.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::clock::Clock;
use crate::error::{ContextError, Result};
use crate::types::Interval;

/// Named, fixed-duration time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PresetId {
    /// Last 15 minutes.
    #[serde(rename = "last_15m")]
    Last15Minutes,
    /// Last hour.
    #[serde(rename = "last_1h")]
    LastHour,
    /// Last 6 hours.
    #[serde(rename = "last_6h")]
    Last6Hours,
    /// Last 24 hours.
    #[serde(rename = "last_24h")]
    Last24Hours,
    /// Last 7 days.
    #[serde(rename = "last_7d")]
    Last7Days,
}

impl PresetId {
    /// Every built-in preset, shortest first.
    pub const ALL: [Self; 5] = [
        Self::Last15Minutes,
        Self::LastHour,
        Self::Last6Hours,
        Self::Last24Hours,
        Self::Last7Days,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Last15Minutes => "last_15m",
            Self::LastHour => "last_1h",
            Self::Last6Hours => "last_6h",
            Self::Last24Hours => "last_24h",
            Self::Last7Days => "last_7d",
        }
    }

    /// Button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Last15Minutes => "Last 15 minutes",
            Self::LastHour => "Last hour",
            Self::Last6Hours => "Last 6 hours",
            Self::Last24Hours => "Last 24 hours",
            Self::Last7Days => "Last 7 days",
        }
    }

    /// Built-in duration in seconds.
    #[must_use]
    pub const fn default_seconds(self) -> u64 {
        match self {
            Self::Last15Minutes => 15 * 60,
            Self::LastHour => 60 * 60,
            Self::Last6Hours => 6 * 60 * 60,
            Self::Last24Hours => 24 * 60 * 60,
            Self::Last7Days => 7 * 24 * 60 * 60,
        }
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetId {
    type Err = ContextError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ContextError::UnknownPreset(s.to_string()))
    }
}

/// One entry of the preset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    /// Preset id.
    pub id: PresetId,
    /// Duration in seconds.
    pub seconds: u64,
}

impl Preset {
    /// The built-in entry for `id`.
    #[must_use]
    pub const fn builtin(id: PresetId) -> Self {
        Self {
            id,
            seconds: id.default_seconds(),
        }
    }

    /// The built-in preset table.
    #[must_use]
    pub fn builtins() -> Vec<Self> {
        PresetId::ALL.into_iter().map(Self::builtin).collect()
    }

    /// Preset duration.
    pub fn duration(&self) -> Result<Duration> {
        i64::try_from(self.seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ContextError::InvalidConfig {
                reason: format!("preset {} has unusable duration {}s", self.id, self.seconds),
            })
    }
}

/// Absolute time range. `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(serialize_with = "serialize_preset")]
    preset: Option<PresetId>,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_preset")]
    preset: Option<PresetId>,
}

const CUSTOM: &str = "custom";

// Wire form is the preset id or `custom`.
#[allow(clippy::ref_option)]
fn serialize_preset<S: Serializer>(
    preset: &Option<PresetId>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(preset.map_or(CUSTOM, PresetId::as_str))
}

fn deserialize_preset<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<PresetId>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(label) if label == CUSTOM => Ok(None),
        Some(label) => label.parse().map(Some).map_err(de::Error::custom),
    }
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = ContextError;

    fn try_from(raw: RawTimeRange) -> Result<Self> {
        let range = Self::new(raw.start, raw.end)?;
        Ok(Self {
            preset: raw.preset,
            ..range
        })
    }
}

impl TimeRange {
    /// Creates a custom range.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(ContextError::InvalidTimeRange { start, end });
        }
        Ok(Self {
            start,
            end,
            preset: None,
        })
    }

    /// Creates a preset range ending at `end`.
    pub fn ending_at(preset: PresetId, duration: Duration, end: DateTime<Utc>) -> Result<Self> {
        let start = end
            .checked_sub_signed(duration)
            .ok_or(ContextError::InvalidTimeRange { start: end, end })?;
        let range = Self::new(start, end)?;
        Ok(Self {
            preset: Some(preset),
            ..range
        })
    }

    /// Start instant.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End instant.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// The preset this range was resolved from, `None` for custom ranges.
    #[must_use]
    pub const fn preset(&self) -> Option<PresetId> {
        self.preset
    }

    /// Whether the range was set from explicit bounds.
    #[must_use]
    pub const fn is_custom(&self) -> bool {
        self.preset.is_none()
    }

    /// Preset wire name, or `custom`.
    #[must_use]
    pub fn preset_label(&self) -> &'static str {
        self.preset.map_or(CUSTOM, PresetId::as_str)
    }

    /// Width of the range.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `t` falls inside the range (inclusive).
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }

    /// Bucket interval for a time-series chart over this range.
    #[must_use]
    pub fn suggested_interval(&self) -> Interval {
        let width = self.duration();
        if width <= Duration::hours(1) {
            Interval::OneMinute
        } else if width <= Duration::hours(6) {
            Interval::FiveMinutes
        } else if width <= Duration::hours(24) {
            Interval::FifteenMinutes
        } else if width <= Duration::days(7) {
            Interval::OneHour
        } else if width <= Duration::days(30) {
            Interval::SixHours
        } else {
            Interval::OneDay
        }
    }
}

/// Resolves presets to absolute ranges against a clock.
#[derive(Debug, Clone)]
pub struct TimeRangeController {
    presets: Vec<Preset>,
    clock: Arc<dyn Clock>,
}

impl TimeRangeController {
    /// Creates a controller over a preset table.
    pub fn new(presets: Vec<Preset>, clock: Arc<dyn Clock>) -> Self {
        Self { presets, clock }
    }

    /// The preset table.
    #[must_use]
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Current instant of the underlying clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Duration of `id`, failing if the table does not offer it.
    pub fn duration_of(&self, id: PresetId) -> Result<Duration> {
        self.presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ContextError::UnknownPreset(id.to_string()))?
            .duration()
    }

    /// Resolves `id` to `[now - duration, now]`.
    pub fn resolve(&self, id: PresetId) -> Result<TimeRange> {
        let duration = self.duration_of(id)?;
        TimeRange::ending_at(id, duration, self.clock.now())
    }
}
