//! Test-only helpers for building engines and schema files.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::action::{ActionFn, ActionRegistry, ActionSpec};
use crate::core::hot_vars::{HotVariable, HotVariableStore};
use crate::core::preferences::{Preference, Preferences};
use crate::core::types::{Optionals, Output};
use crate::core::value::{Value, ValueType};
use crate::dispatch::Engine;
use crate::io::config::EngineConfig;

/// Int hot variable with no check or hook.
pub fn int_var(tag: &str, value: i64) -> HotVariable {
    HotVariable::new(tag, value, ValueType::Int)
}

/// Shared record of action invocations, in call order.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Action function that records `tag` in `log` and returns `output`.
pub fn logged(
    log: &CallLog,
    tag: &str,
    output: Output,
) -> impl Fn(Vec<Value>, &Optionals) -> Output + 'static {
    let log = Rc::clone(log);
    let tag = tag.to_string();
    move |_, _| {
        log.borrow_mut().push(tag.clone());
        output.clone()
    }
}

/// Builder for an [`Engine`] assembled in memory.
#[derive(Default)]
pub struct Fixture {
    store: HotVariableStore,
    prefs: Preferences,
    specs: Vec<ActionSpec>,
    funcs: Vec<(String, ActionFn)>,
    order: Option<Vec<String>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hot(mut self, var: HotVariable) -> Self {
        self.store.insert(var).expect("insert hot variable");
        self
    }

    pub fn pref(mut self, pref: Preference) -> Self {
        self.prefs.insert(pref).expect("insert preference");
        self
    }

    /// Declare an action bound to `func`.
    pub fn action(
        mut self,
        spec: ActionSpec,
        func: impl Fn(Vec<Value>, &Optionals) -> Output + 'static,
    ) -> Self {
        self.funcs.push((spec.tag.clone(), Rc::new(func)));
        self.specs.push(spec);
        self
    }

    /// Declare an action with no function.
    pub fn unbound(mut self, spec: ActionSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn order(mut self, tags: &[&str]) -> Self {
        self.order = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Engine {
        let mut registry = ActionRegistry::new(self.specs, self.order).expect("registry");
        for (tag, func) in self.funcs {
            registry.bind(&tag, func).expect("bind action");
        }
        Engine::new(registry, self.store, self.prefs, &EngineConfig::default()).expect("engine")
    }
}

/// Schema file in a temporary directory, removed on drop.
pub struct TempSchema {
    dir: TempDir,
    path: PathBuf,
}

impl TempSchema {
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let path = dir.path().join("schema.toml");
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a sibling file (for example preference overrides).
    pub fn write_sibling(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Paging schema modelled on the picking tool: two page actions, a clamp
/// that runs after either, and a timed action cycling the pick mode.
pub const PAGING_SCHEMA: &str = r#"
passive_order = ["ClampPage", "LogPage"]

[hot.curPage]
type = "int"
value = 0
check = { bound = [0, 9] }

[hot.pickMode]
type = "str"
value = "P"

[hot.pickTypes]
type = "map"
value = { P = 1, S = 1 }

[pref.lastPage]
type = "str"
value = "last"
condition = { one_of = ["first", "last"] }

[[action]]
tag = "PageFirst"
trigger = { key = "Home" }
returns = ["curPage"]
function = "go_to_page"

[[action]]
tag = "PageLast"
trigger = { key = "End" }
optionals = { go_to_page = "last" }
returns = ["curPage"]
function = "go_to_page"

[[action]]
tag = "ClampPage"
passive = true
trigger = { actions = ["PageFirst", "PageLast"] }

[[action]]
tag = "LogPage"
passive = true
trigger = { actions = ["PageLast"] }
before_trigger = true

[[action]]
tag = "CyclePickMode"
trigger = { key = "Ctrl+M" }
inputs = ["pickMode", "pickTypes"]
returns = ["pickMode"]
timer = true
timer_interval = 0.05
function = "toggle_pick_mode"
"#;
