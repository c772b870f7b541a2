//! Output validation for one action execution.
//!
//! Turns a raw [`Output`] into per-slot verdicts without touching the store.
//! The dispatcher applies the plan only when no slot is invalid.

use crate::core::types::{Output, Returned, SlotCommit, StateView};
use crate::core::value::Value;
use crate::error::EngineError;

/// Validated outputs of one action, ready to apply or discard.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitPlan {
    /// Produced value count did not match `returns`; nothing was checked.
    Discarded(EngineError),
    /// One verdict per declared return, in `returns` order.
    Checked(Vec<(String, SlotCommit)>),
}

impl CommitPlan {
    pub fn is_rejected(&self) -> bool {
        match self {
            CommitPlan::Discarded(_) => true,
            CommitPlan::Checked(slots) => slots
                .iter()
                .any(|(_, slot)| matches!(slot, SlotCommit::Invalid(_))),
        }
    }

    pub fn violations(&self) -> Vec<EngineError> {
        match self {
            CommitPlan::Discarded(err) => vec![err.clone()],
            CommitPlan::Checked(slots) => slots
                .iter()
                .filter_map(|(_, slot)| match slot {
                    SlotCommit::Invalid(err) => Some(err.clone()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Writes in `returns` order, skipped slots omitted. Empty when rejected.
    pub fn into_writes(self) -> Vec<(String, Value)> {
        if self.is_rejected() {
            return Vec::new();
        }
        match self {
            CommitPlan::Discarded(_) => Vec::new(),
            CommitPlan::Checked(slots) => slots
                .into_iter()
                .filter_map(|(tag, slot)| match slot {
                    SlotCommit::Value(value) => Some((tag, value)),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Validate `output` against the action's declared `returns`.
///
/// Arity is all-or-nothing. Once arity matches, every slot is checked even
/// after a failure so one pass surfaces every violation.
pub fn plan_commit(
    action: &str,
    returns: &[String],
    output: Output,
    view: &StateView<'_>,
) -> CommitPlan {
    let produced = output.len();
    if produced != returns.len() {
        return CommitPlan::Discarded(EngineError::ArityMismatch {
            action: action.to_string(),
            expected: returns.len(),
            actual: produced,
        });
    }

    let slots = returns
        .iter()
        .zip(output.into_slots())
        .map(|(tag, returned)| (tag.clone(), check_slot(action, tag, returned, view)))
        .collect();
    CommitPlan::Checked(slots)
}

fn check_slot(action: &str, tag: &str, returned: Returned, view: &StateView<'_>) -> SlotCommit {
    let value = match returned {
        Returned::Pass => return SlotCommit::Skip,
        Returned::Value(value) if value.is_pass_marker() => return SlotCommit::Skip,
        Returned::Value(value) => value,
    };

    let Some(var) = view.hot.variable(tag) else {
        return SlotCommit::Invalid(EngineError::UnknownReturn {
            action: action.to_string(),
            tag: tag.to_string(),
        });
    };

    let actual = value.value_type();
    if !var.declared.admits(actual) {
        return SlotCommit::Invalid(EngineError::TypeMismatch {
            action: action.to_string(),
            tag: tag.to_string(),
            declared: var.declared,
            actual,
        });
    }

    if let Some(check) = &var.check {
        if !check(view, &value) {
            return SlotCommit::Invalid(EngineError::SemanticCheckFailed {
                action: action.to_string(),
                tag: tag.to_string(),
            });
        }
    }

    SlotCommit::Value(value)
}
