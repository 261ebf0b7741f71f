//! Per-rule ACTIVE/INACTIVE tracking.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::rules::evaluate::Verdict;
use crate::types::{DbId, DeviceId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    #[default]
    Inactive,
    Active,
}

/// A state change caused by applying a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activated,
    Deactivated,
}

/// Composite key: (device_id, rule_id).
type StateKey = (DeviceId, DbId);

/// The `(device, rule) -> state` table.
///
/// Kept as one explicit map so it can be snapshotted and inspected in
/// isolation. Pairs never seen are `Inactive`.
#[derive(Debug, Clone, Default)]
pub struct AlertStateTable {
    states: HashMap<StateKey, RuleState>,
}

impl AlertStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: &str, rule_id: DbId) -> RuleState {
        self.states
            .get(&(device_id.to_string(), rule_id))
            .copied()
            .unwrap_or_default()
    }

    /// Apply a verdict and report the transition, if any.
    ///
    /// `NotEvaluable` never changes state.
    pub fn apply(&mut self, device_id: &str, rule_id: DbId, verdict: Verdict) -> Option<Transition> {
        let next = match verdict {
            Verdict::Firing { .. } => RuleState::Active,
            Verdict::Clear => RuleState::Inactive,
            Verdict::NotEvaluable => return None,
        };
        let previous = self
            .states
            .insert((device_id.to_string(), rule_id), next)
            .unwrap_or_default();

        match (previous, next) {
            (RuleState::Inactive, RuleState::Active) => Some(Transition::Activated),
            (RuleState::Active, RuleState::Inactive) => Some(Transition::Deactivated),
            _ => None,
        }
    }

    /// Active rule ids of one device, ascending.
    pub fn active_rules(&self, device_id: &str) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self
            .states
            .iter()
            .filter(|((device, _), state)| device == device_id && **state == RuleState::Active)
            .map(|((_, rule_id), _)| *rule_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Forget every entry of `device_id` whose rule is not in `rule_ids`.
    ///
    /// Returns the forgotten rule ids that were `Active`, ascending. A rule
    /// that comes back later starts from `Inactive` again.
    pub fn retain_rules(&mut self, device_id: &str, rule_ids: &[DbId]) -> Vec<DbId> {
        let mut dropped = Vec::new();
        self.states.retain(|(device, rule_id), state| {
            let keep = device != device_id || rule_ids.contains(rule_id);
            if !keep && *state == RuleState::Active {
                dropped.push(*rule_id);
            }
            keep
        });
        dropped.sort_unstable();
        dropped
    }

    /// An ordered copy of the whole table.
    pub fn snapshot(&self) -> BTreeMap<StateKey, RuleState> {
        self.states
            .iter()
            .map(|(key, state)| (key.clone(), *state))
            .collect()
    }
}
