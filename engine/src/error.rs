use thiserror::Error;

use crate::core::value::ValueType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    // Schema errors, surfaced while the engine is being built.
    #[error("action '{action}' references unknown trigger '{trigger}'")]
    UnknownTrigger { action: String, trigger: String },

    #[error("action '{action}' returns into unknown hot variable '{tag}'")]
    UnknownReturn { action: String, tag: String },

    #[error("duplicate action tag '{0}'")]
    DuplicateAction(String),

    #[error("passive order entry '{0}' is not a declared passive action")]
    NotPassive(String),

    #[error("action '{action}' has invalid timer interval {secs}s")]
    TimerInterval { action: String, secs: f64 },

    #[error("initial value of '{tag}' is {actual}, declared {declared}")]
    InitialType {
        tag: String,
        declared: ValueType,
        actual: ValueType,
    },

    #[error("invalid schema:\n- {}", join_lines(.0))]
    InvalidSchema(Vec<EngineError>),

    // Stimulus errors, returned to the caller of `fire`.
    #[error("action not found: {0}")]
    NotFound(String),

    #[error("action '{0}' is passive and cannot be fired directly")]
    Passive(String),

    #[error("cannot fire '{0}' while another dispatch is in progress")]
    Reentrant(String),

    #[error("hot variable not found: {0}")]
    UnknownHotVariable(String),

    // Per-action errors, recovered inside the dispatcher.
    #[error("action '{action}' input '{key}' is neither a hot variable nor a preference")]
    MissingBinding { action: String, key: String },

    #[error("action '{action}' returned {actual} values, expected {expected}")]
    ArityMismatch {
        action: String,
        expected: usize,
        actual: usize,
    },

    #[error("action '{action}' expected {declared} for hot variable '{tag}', got {actual}")]
    TypeMismatch {
        action: String,
        tag: String,
        declared: ValueType,
        actual: ValueType,
    },

    #[error("action '{action}' failed the '{tag}' check")]
    SemanticCheckFailed { action: String, tag: String },

    // Preference updates coming from the configuration surface.
    #[error("preference not found: {0}")]
    UnknownPreference(String),

    #[error("preference '{tag}' expects {declared}, got {actual}")]
    PreferenceType {
        tag: String,
        declared: ValueType,
        actual: ValueType,
    },

    #[error("preference '{tag}' value does not satisfy {condition}")]
    PreferenceCondition { tag: String, condition: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

fn join_lines(errors: &[EngineError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n- ")
}
