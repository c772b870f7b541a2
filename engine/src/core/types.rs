//! Shared deterministic types for the action engine.
//!
//! These types define the contract between action functions, the commit
//! validator and the dispatcher. They hold no engine state.

use std::collections::BTreeMap;

use crate::core::hot_vars::HotVariableStore;
use crate::core::preferences::Preferences;
use crate::core::value::Value;
use crate::error::EngineError;

/// Keyword arguments passed verbatim to an action function.
pub type Optionals = BTreeMap<String, Value>;

/// One return slot as produced by an action function.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned {
    Value(Value),
    /// Leave the hot variable of this slot unchanged.
    Pass,
}

impl From<Value> for Returned {
    fn from(value: Value) -> Self {
        if value.is_pass_marker() {
            Returned::Pass
        } else {
            Returned::Value(value)
        }
    }
}

/// Result of invoking an action function.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Nothing,
    One(Returned),
    Many(Vec<Returned>),
}

impl Output {
    pub fn one(value: impl Into<Value>) -> Self {
        Output::One(Returned::from(value.into()))
    }

    pub fn many<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Output::Many(
            values
                .into_iter()
                .map(|value| Returned::from(value.into()))
                .collect(),
        )
    }

    pub fn pass() -> Self {
        Output::One(Returned::Pass)
    }

    /// Number of values produced.
    pub fn len(&self) -> usize {
        match self {
            Output::Nothing => 0,
            Output::One(_) => 1,
            Output::Many(slots) => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_slots(self) -> Vec<Returned> {
        match self {
            Output::Nothing => Vec::new(),
            Output::One(slot) => vec![slot],
            Output::Many(slots) => slots,
        }
    }
}

/// Per-slot verdict of commit validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotCommit {
    Value(Value),
    Skip,
    Invalid(EngineError),
}

/// Read-only view handed to semantic checks.
#[derive(Clone, Copy)]
pub struct StateView<'a> {
    pub hot: &'a HotVariableStore,
    pub prefs: &'a Preferences,
}

impl<'a> StateView<'a> {
    /// Resolve `key` the way action inputs are resolved: hot variable first.
    pub fn lookup(&self, key: &str) -> Option<&'a Value> {
        self.hot.value(key).or_else(|| self.prefs.get(key))
    }
}

/// What happened to one queued action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// No function linked; the action is a registered no-op.
    Unbound,
    /// Outputs validated and written (skipped slots are not listed).
    Committed { written: Vec<String> },
    /// Validation failed; nothing was written.
    Rejected {
        violations: Vec<EngineError>,
        timer_stopped: bool,
    },
    /// The action could not be invoked (missing input binding).
    Failed(EngineError),
}

/// Per-action entry of a [`DispatchSummary`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub tag: String,
    pub outcome: ActionOutcome,
}

/// Result of running one active action's queue.
///
/// `reports` is in execution order: before-group, active action, after-group.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSummary {
    pub trigger: String,
    pub reports: Vec<ActionReport>,
}

impl DispatchSummary {
    /// Action tags in the order they ran.
    pub fn queue(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.tag.as_str()).collect()
    }

    pub fn outcome(&self, tag: &str) -> Option<&ActionOutcome> {
        self.reports
            .iter()
            .find(|r| r.tag == tag)
            .map(|r| &r.outcome)
    }

    /// Every reported violation across the queue, in execution order.
    pub fn violations(&self) -> Vec<&EngineError> {
        self.reports
            .iter()
            .flat_map(|r| match &r.outcome {
                ActionOutcome::Rejected { violations, .. } => violations.iter().collect(),
                ActionOutcome::Failed(err) => vec![err],
                _ => Vec::new(),
            })
            .collect()
    }
}

/// Result of a single stimulus.
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Dispatched(DispatchSummary),
    TimerStarted,
    TimerStopped,
}
