//! Drill-down navigation.
//!
//! A drill-down step selects a dimension value *and* records it as a
//! breadcrumb. The breadcrumb trail is layered over the [`FilterMap`]:
//! drilling down always writes the filter, while drilling back up is governed
//! by [`DrilldownFilterPolicy`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ContextError, Result};
use crate::filters::FilterMap;
use crate::types::Dimension;

/// One recorded drill-down step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Dimension narrowed by this step.
    pub dimension: Dimension,
    /// Selected value.
    pub value: String,
    /// Level reached by this step, starting at 1.
    pub level: usize,
}

/// Display entry for a breadcrumb bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreadcrumbLabel {
    /// Text to render.
    pub label: String,
    /// Level to pass to `drill_up` when the entry is clicked.
    pub level: usize,
}

/// Label of the root breadcrumb.
pub const ROOT_LABEL: &str = "All Services";

/// Drill-down navigation state.
///
/// `breadcrumbs.len() == level` and `context` is the dimension→value fold of
/// `breadcrumbs` (later entries win). The fields are private and only
/// changed through [`DrilldownState::push`] and [`DrilldownState::truncate`],
/// so both invariants hold for every value of this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DrilldownState {
    level: usize,
    context: BTreeMap<Dimension, String>,
    breadcrumbs: Vec<Breadcrumb>,
}

impl DrilldownState {
    /// Current depth.
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Folded dimension→value context of the trail.
    #[must_use]
    pub fn context(&self) -> &BTreeMap<Dimension, String> {
        &self.context
    }

    /// Recorded steps, oldest first.
    #[must_use]
    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    /// Whether no step has been taken.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breadcrumbs.is_empty()
    }

    /// Appends a step. Repeating the most recent step is a no-op.
    ///
    /// Returns `true` if a step was appended.
    pub fn push(&mut self, dimension: Dimension, value: &str) -> bool {
        if self
            .breadcrumbs
            .last()
            .is_some_and(|b| b.dimension == dimension && b.value == value)
        {
            return false;
        }
        self.level += 1;
        self.breadcrumbs.push(Breadcrumb {
            dimension,
            value: value.to_string(),
            level: self.level,
        });
        self.context.insert(dimension, value.to_string());
        true
    }

    /// Cuts the trail back to `to_level` steps and returns the removed ones.
    pub fn truncate(&mut self, to_level: usize) -> Result<Vec<Breadcrumb>> {
        if to_level > self.level {
            return Err(ContextError::InvalidDrillLevel {
                requested: to_level,
                current: self.level,
            });
        }
        let removed = self.breadcrumbs.split_off(to_level);
        self.level = to_level;
        self.context = fold(&self.breadcrumbs);
        Ok(removed)
    }

    /// Breadcrumb bar entries, starting with the root.
    #[must_use]
    pub fn labels(&self) -> Vec<BreadcrumbLabel> {
        std::iter::once(BreadcrumbLabel {
            label: ROOT_LABEL.to_string(),
            level: 0,
        })
        .chain(self.breadcrumbs.iter().map(|b| BreadcrumbLabel {
            label: format!("{}: {}", b.dimension.label(), b.value),
            level: b.level,
        }))
        .collect()
    }
}

fn fold(breadcrumbs: &[Breadcrumb]) -> BTreeMap<Dimension, String> {
    breadcrumbs
        .iter()
        .map(|b| (b.dimension, b.value.clone()))
        .collect()
}

/// What happens to filters written by drill-down steps that are later
/// removed from the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrilldownFilterPolicy {
    /// Filters stay in place after drilling up or resetting.
    #[default]
    Sticky,
    /// Filters of removed steps are cleared, unless the user has since
    /// changed them or a remaining step still constrains the dimension.
    Unwind,
}

/// Ordered dimensions a "drill into" click walks through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrillHierarchy {
    levels: Vec<Dimension>,
}

impl Default for DrillHierarchy {
    fn default() -> Self {
        Self {
            levels: vec![
                Dimension::Service,
                Dimension::Endpoint,
                Dimension::Region,
                Dimension::Environment,
            ],
        }
    }
}

impl DrillHierarchy {
    /// Creates a hierarchy from ordered levels.
    #[must_use]
    pub fn new(levels: Vec<Dimension>) -> Self {
        Self { levels }
    }

    /// Ordered levels.
    #[must_use]
    pub fn levels(&self) -> &[Dimension] {
        &self.levels
    }

    /// Dimension grouped at `level`.
    #[must_use]
    pub fn dimension_at(&self, level: usize) -> Option<Dimension> {
        self.levels.get(level).copied()
    }

    /// Deepest level index.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Whether rows shown at `level` can be drilled into.
    #[must_use]
    pub fn is_drillable(&self, level: usize) -> bool {
        level < self.max_depth()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(ContextError::InvalidConfig {
                reason: "drill hierarchy is empty".into(),
            });
        }
        for (i, d) in self.levels.iter().enumerate() {
            if self.levels[..i].contains(d) {
                return Err(ContextError::InvalidConfig {
                    reason: format!("drill hierarchy repeats dimension {d}"),
                });
            }
        }
        Ok(())
    }
}

/// Breadcrumb transitions over a drill-down state and its filter map.
#[derive(Debug, Clone, Default)]
pub struct DrilldownNavigator {
    policy: DrilldownFilterPolicy,
    hierarchy: DrillHierarchy,
}

impl DrilldownNavigator {
    /// Creates a navigator.
    #[must_use]
    pub fn new(policy: DrilldownFilterPolicy, hierarchy: DrillHierarchy) -> Self {
        Self { policy, hierarchy }
    }

    /// Filter policy in force.
    #[must_use]
    pub fn policy(&self) -> DrilldownFilterPolicy {
        self.policy
    }

    /// Drill hierarchy.
    #[must_use]
    pub fn hierarchy(&self) -> &DrillHierarchy {
        &self.hierarchy
    }

    /// Records a step and writes the matching filter.
    pub fn drill_down(
        &self,
        state: &mut DrilldownState,
        filters: &mut FilterMap,
        dimension: Dimension,
        value: &str,
    ) -> Result<()> {
        if value.is_empty() {
            return Err(ContextError::EmptyDrillValue { dimension });
        }
        if state.push(dimension, value) {
            debug!(%dimension, value, level = state.level(), "drilled down");
        }
        filters.set(dimension, Some(value));
        Ok(())
    }

    /// Drills into the next level of the hierarchy.
    pub fn drill_next(
        &self,
        state: &mut DrilldownState,
        filters: &mut FilterMap,
        value: &str,
    ) -> Result<()> {
        let dimension = self
            .hierarchy
            .dimension_at(state.level())
            .ok_or(ContextError::DrillDepthExceeded {
                level: state.level(),
            })?;
        self.drill_down(state, filters, dimension, value)
    }

    /// Cuts the trail back to `to_level`.
    pub fn drill_up(
        &self,
        state: &mut DrilldownState,
        filters: &mut FilterMap,
        to_level: usize,
    ) -> Result<()> {
        let removed = state.truncate(to_level)?;
        if !removed.is_empty() {
            debug!(level = to_level, removed = removed.len(), "drilled up");
        }
        self.unwind(state, filters, &removed);
        Ok(())
    }

    /// Empties the trail.
    pub fn reset(&self, state: &mut DrilldownState, filters: &mut FilterMap) {
        let removed = std::mem::take(state).breadcrumbs;
        self.unwind(state, filters, &removed);
    }

    fn unwind(&self, state: &DrilldownState, filters: &mut FilterMap, removed: &[Breadcrumb]) {
        if self.policy == DrilldownFilterPolicy::Sticky {
            return;
        }
        for step in removed {
            if filters.get(step.dimension) != Some(step.value.as_str()) {
                continue;
            }
            match state.context().get(&step.dimension) {
                Some(remaining) => {
                    filters.set(step.dimension, Some(remaining.as_str()));
                }
                None => {
                    filters.clear(step.dimension);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drilled(nav: &DrilldownNavigator) -> (DrilldownState, FilterMap) {
        let mut state = DrilldownState::default();
        let mut filters = FilterMap::new();
        nav.drill_down(&mut state, &mut filters, Dimension::Service, "checkout-api")
            .unwrap();
        nav.drill_down(&mut state, &mut filters, Dimension::Endpoint, "/pay")
            .unwrap();
        nav.drill_down(&mut state, &mut filters, Dimension::Region, "us-east-1")
            .unwrap();
        (state, filters)
    }

    #[test]
    fn drill_down_records_breadcrumb_and_filter() {
        let nav = DrilldownNavigator::default();
        let mut state = DrilldownState::default();
        let mut filters = FilterMap::new();

        nav.drill_down(&mut state, &mut filters, Dimension::Service, "checkout-api")
            .unwrap();

        assert_eq!(
            state.breadcrumbs(),
            &[Breadcrumb {
                dimension: Dimension::Service,
                value: "checkout-api".into(),
                level: 1,
            }]
        );
        assert_eq!(state.context().get(&Dimension::Service).unwrap(), "checkout-api");
        assert_eq!(filters.get(Dimension::Service), Some("checkout-api"));
    }

    #[test]
    fn repeated_drill_down_is_idempotent() {
        let nav = DrilldownNavigator::default();
        let mut state = DrilldownState::default();
        let mut filters = FilterMap::new();

        nav.drill_down(&mut state, &mut filters, Dimension::Service, "a").unwrap();
        let once = state.clone();
        nav.drill_down(&mut state, &mut filters, Dimension::Service, "a").unwrap();

        assert_eq!(state, once);
    }

    #[test]
    fn empty_drill_value_is_rejected() {
        let nav = DrilldownNavigator::default();
        let mut state = DrilldownState::default();
        let mut filters = FilterMap::new();

        let err = nav
            .drill_down(&mut state, &mut filters, Dimension::Region, "")
            .unwrap_err();
        assert_eq!(err, ContextError::EmptyDrillValue { dimension: Dimension::Region });
        assert!(state.is_empty());
    }

    #[test]
    fn sticky_drill_up_keeps_filters() {
        let nav = DrilldownNavigator::default();
        let (mut state, mut filters) = drilled(&nav);

        nav.drill_up(&mut state, &mut filters, 1).unwrap();

        assert_eq!(state.level(), 1);
        assert_eq!(state.context().len(), 1);
        assert_eq!(filters.get(Dimension::Endpoint), Some("/pay"));
        assert_eq!(filters.get(Dimension::Region), Some("us-east-1"));
    }

    #[test]
    fn unwind_drill_up_clears_removed_filters() {
        let nav = DrilldownNavigator::new(DrilldownFilterPolicy::Unwind, DrillHierarchy::default());
        let (mut state, mut filters) = drilled(&nav);

        nav.drill_up(&mut state, &mut filters, 1).unwrap();

        assert_eq!(filters.get(Dimension::Service), Some("checkout-api"));
        assert_eq!(filters.get(Dimension::Endpoint), None);
        assert_eq!(filters.get(Dimension::Region), None);
    }

    #[test]
    fn unwind_keeps_filters_the_user_changed() {
        let nav = DrilldownNavigator::new(DrilldownFilterPolicy::Unwind, DrillHierarchy::default());
        let (mut state, mut filters) = drilled(&nav);
        filters.set(Dimension::Region, Some("eu-west-1"));

        nav.reset(&mut state, &mut filters);

        assert!(state.is_empty());
        assert_eq!(filters.get(Dimension::Service), None);
        assert_eq!(filters.get(Dimension::Region), Some("eu-west-1"));
    }

    #[test]
    fn unwind_restores_value_of_remaining_step() {
        let nav = DrilldownNavigator::new(DrilldownFilterPolicy::Unwind, DrillHierarchy::default());
        let mut state = DrilldownState::default();
        let mut filters = FilterMap::new();
        nav.drill_down(&mut state, &mut filters, Dimension::Service, "a").unwrap();
        nav.drill_down(&mut state, &mut filters, Dimension::Service, "b").unwrap();

        nav.drill_up(&mut state, &mut filters, 1).unwrap();

        assert_eq!(filters.get(Dimension::Service), Some("a"));
    }

    #[test]
    fn unwind_keeps_user_value_over_remaining_step() {
        let nav = DrilldownNavigator::new(DrilldownFilterPolicy::Unwind, DrillHierarchy::default());
        let mut state = DrilldownState::default();
        let mut filters = FilterMap::new();
        nav.drill_down(&mut state, &mut filters, Dimension::Service, "a").unwrap();
        nav.drill_down(&mut state, &mut filters, Dimension::Service, "b").unwrap();
        filters.set(Dimension::Service, Some("c"));

        nav.drill_up(&mut state, &mut filters, 1).unwrap();

        assert_eq!(state.level(), 1);
        assert_eq!(filters.get(Dimension::Service), Some("c"));
    }

    #[test]
    fn drill_up_past_current_level_fails() {
        let nav = DrilldownNavigator::default();
        let (mut state, mut filters) = drilled(&nav);

        let err = nav.drill_up(&mut state, &mut filters, 4).unwrap_err();
        assert_eq!(err, ContextError::InvalidDrillLevel { requested: 4, current: 3 });
        assert_eq!(state.level(), 3);
    }

    #[test]
    fn drill_next_walks_hierarchy() {
        let nav = DrilldownNavigator::default();
        let mut state = DrilldownState::default();
        let mut filters = FilterMap::new();

        for value in ["checkout-api", "/pay", "us-east-1", "production"] {
            nav.drill_next(&mut state, &mut filters, value).unwrap();
        }
        assert_eq!(filters.get(Dimension::Environment), Some("production"));

        let err = nav.drill_next(&mut state, &mut filters, "x").unwrap_err();
        assert_eq!(err, ContextError::DrillDepthExceeded { level: 4 });
    }

    #[test]
    fn hierarchy_depth_and_drillability() {
        let hierarchy = DrillHierarchy::default();
        assert_eq!(hierarchy.max_depth(), 3);
        assert!(hierarchy.is_drillable(2));
        assert!(!hierarchy.is_drillable(3));
        assert_eq!(hierarchy.dimension_at(1), Some(Dimension::Endpoint));
        assert!(hierarchy.validate().is_ok());

        let repeated = DrillHierarchy::new(vec![Dimension::Service, Dimension::Service]);
        assert!(repeated.validate().is_err());
    }

    #[test]
    fn labels_start_with_root() {
        let nav = DrilldownNavigator::default();
        let (state, _) = drilled(&nav);

        let labels = state.labels();
        assert_eq!(labels[0].label, ROOT_LABEL);
        assert_eq!(labels[0].level, 0);
        assert_eq!(labels[1].label, "Service: checkout-api");
        assert_eq!(labels[3].label, "Region: us-east-1");
        assert_eq!(labels[3].level, 3);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Down(Dimension, String),
        Up(usize),
        Reset,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (prop::sample::select(Dimension::ALL.to_vec()), "[a-c]")
                .prop_map(|(d, v)| Op::Down(d, v)),
            (0usize..5).prop_map(Op::Up),
            Just(Op::Reset),
        ]
    }

    proptest! {
        #[test]
        fn prop_trail_invariants_hold(
            ops in prop::collection::vec(op(), 0..40),
            unwind in any::<bool>(),
        ) {
            let policy = if unwind { DrilldownFilterPolicy::Unwind } else { DrilldownFilterPolicy::Sticky };
            let nav = DrilldownNavigator::new(policy, DrillHierarchy::default());
            let mut state = DrilldownState::default();
            let mut filters = FilterMap::new();

            for op in ops {
                match op {
                    Op::Down(d, v) => { nav.drill_down(&mut state, &mut filters, d, &v).unwrap(); }
                    Op::Up(level) => { let _ = nav.drill_up(&mut state, &mut filters, level); }
                    Op::Reset => nav.reset(&mut state, &mut filters),
                }
                prop_assert_eq!(state.breadcrumbs().len(), state.level());
                prop_assert_eq!(state.context(), &fold(state.breadcrumbs()));
                for (i, b) in state.breadcrumbs().iter().enumerate() {
                    prop_assert_eq!(b.level, i + 1);
                }
            }
        }
    }
}
