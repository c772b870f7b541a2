//! Read-mostly configuration values available to actions as inputs.
//!
//! Actions never write preferences. The external configuration surface
//! updates them through [`Preferences::update`], which enforces the declared
//! type and the optional [`Condition`].

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::hot_vars::ChangeHook;
use crate::core::value::{Value, ValueType};
use crate::error::{EngineError, Result};

/// Declarative value constraint.
///
/// Map values are checked entry by entry; everything else is checked as a
/// single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Inclusive numeric range.
    Bound([f64; 2]),
    /// Value must equal one of the listed values.
    OneOf(Vec<Value>),
}

impl Condition {
    pub fn check(&self, value: &Value) -> bool {
        match value {
            Value::Map(map) => map.values().all(|v| self.check_one(v)),
            other => self.check_one(other),
        }
    }

    fn check_one(&self, value: &Value) -> bool {
        match self {
            Condition::Bound([lo, hi]) => value
                .as_number()
                .is_some_and(|n| n >= *lo && n <= *hi),
            Condition::OneOf(allowed) => allowed.iter().any(|a| a == value),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Bound([lo, hi]) => write!(f, "bound [{lo}, {hi}]"),
            Condition::OneOf(allowed) => {
                let labels: Vec<String> = allowed
                    .iter()
                    .map(|v| match v.as_text() {
                        Some(text) => text.to_string(),
                        None => format!("{v:?}"),
                    })
                    .collect();
                write!(f, "one of [{}]", labels.join(", "))
            }
        }
    }
}

#[derive(Clone)]
pub struct Preference {
    pub tag: String,
    pub value: Value,
    pub declared: ValueType,
    pub condition: Option<Condition>,
    /// Short human-readable description.
    pub tip: String,
    pub on_change: Option<ChangeHook>,
}

impl Preference {
    pub fn new(tag: impl Into<String>, value: impl Into<Value>, declared: ValueType) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
            declared,
            condition: None,
            tip: String::new(),
            on_change: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_tip(mut self, tip: impl Into<String>) -> Self {
        self.tip = tip.into();
        self
    }

    pub fn with_hook(mut self, hook: impl Fn(&str, &Value) + 'static) -> Self {
        self.on_change = Some(Rc::new(hook));
        self
    }

    fn validate(&self, value: &Value) -> Result<()> {
        let actual = value.value_type();
        if !self.declared.admits(actual) {
            return Err(EngineError::PreferenceType {
                tag: self.tag.clone(),
                declared: self.declared,
                actual,
            });
        }
        if let Some(condition) = &self.condition {
            if !condition.check(value) {
                return Err(EngineError::PreferenceCondition {
                    tag: self.tag.clone(),
                    condition: condition.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preference")
            .field("tag", &self.tag)
            .field("value", &self.value)
            .field("declared", &self.declared)
            .field("condition", &self.condition)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Preferences {
    prefs: BTreeMap<String, Preference>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a preference from the startup schema. Only the declared type is
    /// enforced here; conditions apply to later updates.
    pub fn insert(&mut self, pref: Preference) -> Result<()> {
        let actual = pref.value.value_type();
        if !pref.declared.admits(actual) {
            return Err(EngineError::InitialType {
                tag: pref.tag,
                declared: pref.declared,
                actual,
            });
        }
        self.prefs.insert(pref.tag.clone(), pref);
        Ok(())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.prefs.contains_key(tag)
    }

    pub fn get(&self, tag: &str) -> Option<&Value> {
        self.prefs.get(tag).map(|p| &p.value)
    }

    pub fn preference(&self, tag: &str) -> Option<&Preference> {
        self.prefs.get(tag)
    }

    /// Validate and store a new value. The caller runs the hook afterwards.
    pub fn update(&mut self, tag: &str, value: Value) -> Result<Option<ChangeHook>> {
        let pref = self
            .prefs
            .get_mut(tag)
            .ok_or_else(|| EngineError::UnknownPreference(tag.to_string()))?;
        pref.validate(&value)?;
        pref.value = value;
        Ok(pref.on_change.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preference> {
        self.prefs.values()
    }
}
