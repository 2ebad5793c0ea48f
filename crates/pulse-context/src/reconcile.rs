//! Options reconciliation.
//!
//! When fresh candidate lists arrive, selections they no longer contain are
//! cleared and mandatory dimensions receive a default. The reconciler only
//! computes a [`Reconciliation`]; the store applies it as one transition.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::filters::FilterMap;
use crate::types::Dimension;

/// Candidate values per dimension as returned by the options endpoint.
///
/// A missing list means "not loaded" and carries no information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableOptions {
    /// Service names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    /// Endpoint paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
    /// Regions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
    /// Environments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environments: Option<Vec<String>>,
    /// Metric names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
    /// Status values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<String>>,
}

impl AvailableOptions {
    /// Loaded candidates for `dimension`.
    #[must_use]
    pub fn candidates(&self, dimension: Dimension) -> Option<&[String]> {
        self.slot(dimension).map(Vec::as_slice)
    }

    /// Replaces the candidates for `dimension`.
    pub fn set(&mut self, dimension: Dimension, values: Vec<String>) {
        *self.slot_mut(dimension) = Some(values);
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, dimension: Dimension, values: Vec<String>) -> Self {
        self.set(dimension, values);
        self
    }

    /// Copy holding only the list for `dimension`.
    ///
    /// An options widget owns one dimension; the other lists in its response
    /// were computed against a different filter set and are dropped.
    #[must_use]
    pub fn only(&self, dimension: Dimension) -> Self {
        let mut out = Self::default();
        *out.slot_mut(dimension) = self.slot(dimension).cloned();
        out
    }

    /// Overwrites lists with the ones loaded in `other`.
    pub fn merge(&mut self, other: &Self) {
        for dimension in Dimension::ALL {
            if let Some(values) = other.slot(dimension) {
                *self.slot_mut(dimension) = Some(values.clone());
            }
        }
    }

    fn slot(&self, dimension: Dimension) -> Option<&Vec<String>> {
        match dimension {
            Dimension::Service => self.services.as_ref(),
            Dimension::Endpoint => self.endpoints.as_ref(),
            Dimension::Region => self.regions.as_ref(),
            Dimension::Environment => self.environments.as_ref(),
            Dimension::MetricName => self.metrics.as_ref(),
            Dimension::Status => self.statuses.as_ref(),
        }
    }

    fn slot_mut(&mut self, dimension: Dimension) -> &mut Option<Vec<String>> {
        match dimension {
            Dimension::Service => &mut self.services,
            Dimension::Endpoint => &mut self.endpoints,
            Dimension::Region => &mut self.regions,
            Dimension::Environment => &mut self.environments,
            Dimension::MetricName => &mut self.metrics,
            Dimension::Status => &mut self.statuses,
        }
    }
}

/// Why the reconciler changed a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// The value is not among the fresh candidates.
    Stale,
    /// A mandatory dimension received its first candidate.
    Defaulted,
}

/// One filter change proposed by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChange {
    /// Affected dimension.
    pub dimension: Dimension,
    /// Value the change was computed against.
    pub from: Option<String>,
    /// New value.
    pub to: Option<String>,
    /// Cause.
    pub reason: ChangeReason,
}

/// Ordered set of filter changes from one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    changes: Vec<FilterChange>,
}

impl Reconciliation {
    /// Proposed changes in dimension order.
    #[must_use]
    pub fn changes(&self) -> &[FilterChange] {
        &self.changes
    }

    /// Whether nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Applies each change whose `from` still matches the map.
    ///
    /// A change computed against a value the user has since replaced is
    /// skipped. Returns the number of changes applied.
    pub fn apply_to(&self, filters: &mut FilterMap) -> usize {
        let mut applied = 0;
        for change in &self.changes {
            if filters.get(change.dimension) != change.from.as_deref() {
                continue;
            }
            if filters.set(change.dimension, change.to.as_deref()) {
                applied += 1;
            }
        }
        applied
    }
}

/// Clears stale selections and fills mandatory defaults.
///
/// Each mandatory dimension has a latch. It starts armed, is disarmed when a
/// default fires or the dimension holds a valid value, and is re-armed when a
/// loaded list for it is empty, when the reconciler clears it as stale, or by
/// [`rearm_all`](Self::rearm_all). A user clearing the filter leaves the
/// latch disarmed, so the default does not come back.
#[derive(Debug, Clone)]
pub struct OptionsReconciler {
    mandatory: BTreeSet<Dimension>,
    armed: BTreeSet<Dimension>,
}

impl OptionsReconciler {
    /// Creates a reconciler with every mandatory latch armed.
    pub fn new(mandatory: impl IntoIterator<Item = Dimension>) -> Self {
        let mandatory: BTreeSet<Dimension> = mandatory.into_iter().collect();
        Self {
            armed: mandatory.clone(),
            mandatory,
        }
    }

    /// Whether `dimension` is mandatory-default.
    #[must_use]
    pub fn is_mandatory(&self, dimension: Dimension) -> bool {
        self.mandatory.contains(&dimension)
    }

    /// Whether the default for `dimension` may still fire.
    #[must_use]
    pub fn is_armed(&self, dimension: Dimension) -> bool {
        self.armed.contains(&dimension)
    }

    /// Re-arms every mandatory latch.
    pub fn rearm_all(&mut self) {
        self.armed.clone_from(&self.mandatory);
    }

    /// Computes the changes implied by `options` for `filters`.
    pub fn reconcile(&mut self, filters: &FilterMap, options: &AvailableOptions) -> Reconciliation {
        let mut changes = Vec::new();

        for dimension in Dimension::ALL {
            let Some(candidates) = options.candidates(dimension) else {
                continue;
            };
            let mandatory = self.is_mandatory(dimension);

            let Some(first) = candidates.first() else {
                if mandatory {
                    self.armed.insert(dimension);
                }
                continue;
            };

            match filters.get(dimension) {
                Some(current) if candidates.iter().any(|c| c == current) => {
                    self.armed.remove(&dimension);
                }
                Some(current) => {
                    // A stale mandatory value goes straight to the default.
                    let (to, reason) = if mandatory {
                        (Some(first.clone()), ChangeReason::Defaulted)
                    } else {
                        (None, ChangeReason::Stale)
                    };
                    self.armed.remove(&dimension);
                    changes.push(FilterChange {
                        dimension,
                        from: Some(current.to_string()),
                        to,
                        reason,
                    });
                }
                None if mandatory && self.armed.remove(&dimension) => {
                    changes.push(FilterChange {
                        dimension,
                        from: None,
                        to: Some(first.clone()),
                        reason: ChangeReason::Defaulted,
                    });
                }
                None => {}
            }
        }

        for change in &changes {
            info!(
                dimension = %change.dimension,
                from = change.from.as_deref().unwrap_or(""),
                to = change.to.as_deref().unwrap_or(""),
                reason = ?change.reason,
                "filter reconciled"
            );
        }

        Reconciliation { changes }
    }
}

impl Default for OptionsReconciler {
    fn default() -> Self {
        Self::new([Dimension::MetricName])
    }
}
