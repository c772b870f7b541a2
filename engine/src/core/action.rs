//! Action declarations, function linking and the action registry.
//!
//! The registry only stores and looks up actions. Queue construction and
//! execution live in the dispatcher.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::types::{Optionals, Output};
use crate::core::value::Value;
use crate::error::{EngineError, Result};

/// Uniform action function: positional inputs plus keyword optionals.
pub type ActionFn = Rc<dyn Fn(Vec<Value>, &Optionals) -> Output>;

/// What fires an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Never fired by a stimulus of its own.
    #[default]
    None,
    /// Key sequence such as `Ctrl+P`.
    Key(String),
    /// Fired by a widget double-click handler.
    DoubleClick,
    /// Passive trigger: the active actions this action follows or precedes.
    Actions(Vec<String>),
}

impl Trigger {
    /// Set membership test against the active-action list.
    pub fn listens_to(&self, active_tag: &str) -> bool {
        match self {
            Trigger::Actions(tags) => tags.iter().any(|t| t == active_tag),
            _ => false,
        }
    }
}

/// Serializable part of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub tag: String,
    /// Display name; defaults to empty.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub before_trigger: bool,
    #[serde(default)]
    pub passive: bool,
    /// Keys resolved against hot variables first, preferences second.
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub optionals: Optionals,
    /// Hot variables the outputs are written to, in order.
    #[serde(default)]
    pub returns: Vec<String>,
    #[serde(default)]
    pub timer: bool,
    /// Seconds between timer ticks; the engine default applies when unset.
    #[serde(default)]
    pub timer_interval: Option<f64>,
    /// Name the function is linked by at startup.
    #[serde(default)]
    pub function: Option<String>,
}

impl ActionSpec {
    /// Active action with no trigger binding.
    pub fn active(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: String::new(),
            trigger: Trigger::None,
            before_trigger: false,
            passive: false,
            inputs: Vec::new(),
            optionals: Optionals::new(),
            returns: Vec::new(),
            timer: false,
            timer_interval: None,
            function: None,
        }
    }

    /// Passive action following (or preceding) the given active actions.
    pub fn passive<I, S>(tag: impl Into<String>, triggers: I, before_trigger: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trigger: Trigger::Actions(triggers.into_iter().map(Into::into).collect()),
            before_trigger,
            passive: true,
            ..Self::active(tag)
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.trigger = Trigger::Key(key.into());
        self
    }

    pub fn inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn returns<I, S>(mut self, returns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returns = returns.into_iter().map(Into::into).collect();
        self
    }

    pub fn optional(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.optionals.insert(key.into(), value.into());
        self
    }

    pub fn timed(mut self, interval_secs: f64) -> Self {
        self.timer = true;
        self.timer_interval = Some(interval_secs);
        self
    }

    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }
}

/// A declared action plus its (possibly unbound) function.
#[derive(Clone)]
pub struct Action {
    pub spec: ActionSpec,
    pub func: Option<ActionFn>,
}

impl Action {
    pub fn tag(&self) -> &str {
        &self.spec.tag
    }

    pub fn is_bound(&self) -> bool {
        self.func.is_some()
    }
}

impl From<ActionSpec> for Action {
    fn from(spec: ActionSpec) -> Self {
        Self { spec, func: None }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("spec", &self.spec)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Named functions available for linking at startup.
#[derive(Default, Clone)]
pub struct FunctionTable {
    funcs: BTreeMap<String, ActionFn>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(Vec<Value>, &Optionals) -> Output + 'static,
    ) -> &mut Self {
        self.funcs.insert(name.into(), Rc::new(func));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ActionFn> {
        self.funcs.get(name)
    }
}

#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Action>,
    passive_order: Vec<String>,
}

impl ActionRegistry {
    /// Build the registry. Without an explicit passive order, every passive
    /// action is ordered by declaration.
    pub fn new(specs: Vec<ActionSpec>, passive_order: Option<Vec<String>>) -> Result<Self> {
        let declared_passives: Vec<String> = specs
            .iter()
            .filter(|s| s.passive)
            .map(|s| s.tag.clone())
            .collect();

        let mut actions = BTreeMap::new();
        for spec in specs {
            if actions.contains_key(&spec.tag) {
                return Err(EngineError::DuplicateAction(spec.tag));
            }
            actions.insert(spec.tag.clone(), Action::from(spec));
        }

        Ok(Self {
            actions,
            passive_order: passive_order.unwrap_or(declared_passives),
        })
    }

    pub fn lookup(&self, tag: &str) -> Result<&Action> {
        self.actions
            .get(tag)
            .ok_or_else(|| EngineError::NotFound(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.actions.contains_key(tag)
    }

    pub fn passive_order(&self) -> &[String] {
        &self.passive_order
    }

    /// Link (or relink) the function of one action.
    pub fn bind(&mut self, tag: &str, func: ActionFn) -> Result<()> {
        let action = self
            .actions
            .get_mut(tag)
            .ok_or_else(|| EngineError::NotFound(tag.to_string()))?;
        action.func = Some(func);
        Ok(())
    }

    /// Link every action that names a function found in `table`. Unknown
    /// names leave the action unbound. Returns the number of linked actions.
    pub fn link(&mut self, table: &FunctionTable) -> usize {
        let mut linked = 0;
        for action in self.actions.values_mut() {
            let Some(name) = &action.spec.function else {
                continue;
            };
            match table.get(name) {
                Some(func) => {
                    action.func = Some(Rc::clone(func));
                    linked += 1;
                }
                None => {
                    warn!(action = %action.spec.tag, function = %name, "no function with this name, action left unbound");
                }
            }
        }
        debug!(linked, total = self.actions.len(), "linked action functions");
        linked
    }

    /// Non-passive actions bound to `key`, in tag order.
    pub fn active_for_key(&self, key: &str) -> Vec<&Action> {
        self.actions
            .values()
            .filter(|a| !a.spec.passive && matches!(&a.spec.trigger, Trigger::Key(k) if k == key))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Action tags must be unique.
    #[test]
    fn new_rejects_duplicate_tags() {
        let err = ActionRegistry::new(
            vec![ActionSpec::active("PickAdd"), ActionSpec::active("PickAdd")],
            None,
        )
        .expect_err("duplicate");
        assert_eq!(err, EngineError::DuplicateAction("PickAdd".to_string()));
    }

    /// Missing passive order defaults to declaration order of passives.
    #[test]
    fn default_passive_order_follows_declaration() {
        let registry = ActionRegistry::new(
            vec![
                ActionSpec::passive("Zeta", ["A"], false),
                ActionSpec::active("A"),
                ActionSpec::passive("Alpha", ["A"], true),
            ],
            None,
        )
        .expect("registry");
        assert_eq!(
            registry.passive_order(),
            &["Zeta".to_string(), "Alpha".to_string()]
        );
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let registry = ActionRegistry::new(vec![], None).expect("registry");
        assert_eq!(
            registry.lookup("nope").expect_err("missing").to_string(),
            "action not found: nope"
        );
    }

    /// Linking leaves actions with unknown function names unbound.
    #[test]
    fn link_binds_known_functions_only() {
        let mut table = FunctionTable::new();
        table.register("noop", |_, _| Output::Nothing);
        let mut registry = ActionRegistry::new(
            vec![
                ActionSpec::active("A").function("noop"),
                ActionSpec::active("B").function("missing"),
                ActionSpec::active("C"),
            ],
            None,
        )
        .expect("registry");

        assert_eq!(registry.link(&table), 1);
        assert!(registry.lookup("A").expect("A").is_bound());
        assert!(!registry.lookup("B").expect("B").is_bound());
        assert!(!registry.lookup("C").expect("C").is_bound());
    }

    /// Key lookups skip passive actions even if they carry a key trigger.
    #[test]
    fn active_for_key_ignores_passives() {
        let mut passive = ActionSpec::passive("P", ["A"], false);
        passive.trigger = Trigger::Key("Ctrl+P".to_string());
        let registry = ActionRegistry::new(
            vec![
                ActionSpec::active("A").key("Ctrl+P"),
                ActionSpec::active("B").key("Ctrl+Q"),
                passive,
            ],
            None,
        )
        .expect("registry");
        let tags: Vec<&str> = registry
            .active_for_key("Ctrl+P")
            .into_iter()
            .map(Action::tag)
            .collect();
        assert_eq!(tags, vec!["A"]);
    }

    /// Trigger membership is a set test over the listed active tags.
    #[test]
    fn trigger_listens_to_listed_tags_only() {
        let trigger = Trigger::Actions(vec!["A".to_string(), "B".to_string()]);
        assert!(trigger.listens_to("A"));
        assert!(!trigger.listens_to("C"));
        assert!(!Trigger::Key("A".to_string()).listens_to("A"));
    }

    /// Triggers parse from the TOML shapes used in schema files.
    #[test]
    fn trigger_parses_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            a: Trigger,
            b: Trigger,
            c: Trigger,
        }
        let doc: Doc = toml::from_str(
            "a = \"double_click\"\nb = { key = \"Ctrl+P\" }\nc = { actions = [\"PickAdd\"] }\n",
        )
        .expect("parse");
        assert_eq!(doc.a, Trigger::DoubleClick);
        assert_eq!(doc.b, Trigger::Key("Ctrl+P".to_string()));
        assert_eq!(doc.c, Trigger::Actions(vec!["PickAdd".to_string()]));
    }
}
