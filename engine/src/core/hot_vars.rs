//! Keyed, typed engine state with per-key change notification.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::core::types::StateView;
use crate::core::value::{Value, ValueType};
use crate::error::{EngineError, Result};

/// Predicate run on a type-valid candidate before it may be committed.
pub type SemanticCheck = Rc<dyn Fn(&StateView<'_>, &Value) -> bool>;

/// Hook invoked with `(tag, new value)` after a committed change.
///
/// Hooks must not fire stimuli; the engine refuses nested dispatch.
pub type ChangeHook = Rc<dyn Fn(&str, &Value)>;

#[derive(Clone)]
pub struct HotVariable {
    pub tag: String,
    pub value: Value,
    pub declared: ValueType,
    /// Bulk values are handed out as copies only.
    pub bulk: bool,
    pub check: Option<SemanticCheck>,
    pub on_change: Option<ChangeHook>,
}

impl HotVariable {
    pub fn new(tag: impl Into<String>, value: impl Into<Value>, declared: ValueType) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
            declared,
            bulk: false,
            check: None,
            on_change: None,
        }
    }

    pub fn bulk(mut self) -> Self {
        self.bulk = true;
        self
    }

    pub fn with_check(mut self, check: impl Fn(&StateView<'_>, &Value) -> bool + 'static) -> Self {
        self.check = Some(Rc::new(check));
        self
    }

    pub fn with_hook(mut self, hook: impl Fn(&str, &Value) + 'static) -> Self {
        self.on_change = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for HotVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotVariable")
            .field("tag", &self.tag)
            .field("value", &self.value)
            .field("declared", &self.declared)
            .field("bulk", &self.bulk)
            .field("check", &self.check.is_some())
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// The hot variable table. Holds no business logic: writes are
/// unconditional, validation happens before [`HotVariableStore::set`].
#[derive(Debug, Default)]
pub struct HotVariableStore {
    vars: BTreeMap<String, HotVariable>,
}

impl HotVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable from the startup schema. The initial value must
    /// already conform to the declared type.
    pub fn insert(&mut self, var: HotVariable) -> Result<()> {
        let actual = var.value.value_type();
        if !var.declared.admits(actual) {
            return Err(EngineError::InitialType {
                tag: var.tag,
                declared: var.declared,
                actual,
            });
        }
        self.vars.insert(var.tag.clone(), var);
        Ok(())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.vars.contains_key(tag)
    }

    /// Current value; bulk entries come back as an owned copy.
    pub fn get(&self, tag: &str) -> Option<Cow<'_, Value>> {
        self.vars.get(tag).map(|var| {
            if var.bulk {
                Cow::Owned(var.value.clone())
            } else {
                Cow::Borrowed(&var.value)
            }
        })
    }

    /// Borrow the current value regardless of the bulk flag.
    pub fn value(&self, tag: &str) -> Option<&Value> {
        self.vars.get(tag).map(|var| &var.value)
    }

    pub fn variable(&self, tag: &str) -> Option<&HotVariable> {
        self.vars.get(tag)
    }

    /// Unconditional write used by the commit step. Returns false for an
    /// unknown tag.
    pub fn set(&mut self, tag: &str, value: Value) -> bool {
        match self.vars.get_mut(tag) {
            Some(var) => {
                var.value = value;
                true
            }
            None => false,
        }
    }

    /// Run the change hook of `tag` with its current value.
    pub fn on_committed(&self, tag: &str) {
        if let Some(var) = self.vars.get(tag) {
            if let Some(hook) = &var.on_change {
                hook(tag, &var.value);
            }
        }
    }

    /// Copy of every value, keyed by tag.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .map(|(tag, var)| (tag.clone(), var.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Initial values must satisfy the declared type.
    #[test]
    fn insert_rejects_mistyped_initial_value() {
        let mut store = HotVariableStore::new();
        let err = store
            .insert(HotVariable::new("curPage", "zero", ValueType::Int))
            .expect_err("expected type error");
        assert_eq!(
            err,
            EngineError::InitialType {
                tag: "curPage".to_string(),
                declared: ValueType::Int,
                actual: ValueType::Str,
            }
        );
        assert!(!store.contains("curPage"));
    }

    /// Bulk variables are copied out, others are borrowed.
    #[test]
    fn get_copies_bulk_entries_only() {
        let mut store = HotVariableStore::new();
        store
            .insert(HotVariable::new("stream", vec![Value::Float(1.0)], ValueType::List).bulk())
            .expect("insert stream");
        store
            .insert(HotVariable::new("curPage", 0, ValueType::Int))
            .expect("insert page");

        assert!(matches!(store.get("stream"), Some(Cow::Owned(_))));
        assert!(matches!(store.get("curPage"), Some(Cow::Borrowed(_))));
        assert!(store.get("missing").is_none());
    }

    /// Writes are unconditional and hooks see the new value.
    #[test]
    fn set_then_hook_observes_new_value() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut store = HotVariableStore::new();
        store
            .insert(
                HotVariable::new("pickMode", "P", ValueType::Str).with_hook(move |tag, value| {
                    sink.borrow_mut().push(format!("{tag}={}", value.as_text().unwrap_or("?")));
                }),
            )
            .expect("insert");

        assert!(store.set("pickMode", Value::from("S")));
        store.on_committed("pickMode");

        assert_eq!(store.value("pickMode"), Some(&Value::from("S")));
        assert_eq!(*seen.borrow(), vec!["pickMode=S".to_string()]);
        assert!(!store.set("missing", Value::Null));
    }
}
