//! Stimulus ingestion, queue construction and the execute-validate-commit
//! protocol.
//!
//! The engine is single-threaded. Every entry point that can run actions or
//! write state holds a dispatch guard; a nested call made from inside an
//! action function or a change hook fails with [`EngineError::Reentrant`]
//! instead of starting a second dispatch.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::action::{Action, ActionRegistry, FunctionTable};
use crate::core::commit::{CommitPlan, plan_commit};
use crate::core::hot_vars::{HotVariable, HotVariableStore};
use crate::core::invariants::validate_schema;
use crate::core::preferences::{Preference, Preferences};
use crate::core::timers::{TimerManager, Toggle, interval_from_secs};
use crate::core::types::{ActionOutcome, ActionReport, DispatchSummary, FireOutcome, StateView};
use crate::core::value::Value;
use crate::error::{EngineError, Result};
use crate::io::config::{EngineConfig, Schema};

pub struct Engine {
    registry: ActionRegistry,
    store: RefCell<HotVariableStore>,
    prefs: RefCell<Preferences>,
    timers: RefCell<TimerManager>,
    default_interval: Duration,
    dispatching: Cell<bool>,
}

/// Marks the engine busy for the lifetime of the guard.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>, what: &str) -> Result<Self> {
        if flag.replace(true) {
            warn!(stimulus = %what, "refused re-entrant dispatch");
            return Err(EngineError::Reentrant(what.to_string()));
        }
        Ok(Self(flag))
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Engine {
    /// Assemble an engine from prepared tables. Schema invariants are
    /// checked here; any violation prevents startup.
    pub fn new(
        registry: ActionRegistry,
        store: HotVariableStore,
        prefs: Preferences,
        config: &EngineConfig,
    ) -> Result<Self> {
        let errors = validate_schema(&registry, &store);
        if !errors.is_empty() {
            return Err(EngineError::InvalidSchema(errors));
        }
        debug!(
            actions = registry.iter().count(),
            passive_order = registry.passive_order().len(),
            "engine ready"
        );
        Ok(Self {
            registry,
            store: RefCell::new(store),
            prefs: RefCell::new(prefs),
            timers: RefCell::new(TimerManager::new()),
            default_interval: config.default_timer_interval(),
            dispatching: Cell::new(false),
        })
    }

    /// Build an engine from a parsed schema file, linking action functions
    /// by name from `functions`.
    pub fn from_schema(schema: Schema, functions: &FunctionTable) -> Result<Self> {
        let mut store = HotVariableStore::new();
        for (tag, decl) in schema.hot {
            let mut var = HotVariable::new(tag, decl.value, decl.declared);
            var.bulk = decl.bulk;
            if let Some(condition) = decl.check {
                var = var.with_check(move |_, value| condition.check(value));
            }
            store.insert(var)?;
        }

        let mut prefs = Preferences::new();
        for (tag, decl) in schema.pref {
            let mut pref = Preference::new(tag, decl.value, decl.declared).with_tip(decl.tip);
            pref.condition = decl.condition;
            prefs.insert(pref)?;
        }

        let mut registry = ActionRegistry::new(schema.action, schema.passive_order)?;
        registry.link(functions);

        Self::new(registry, store, prefs, &schema.engine)
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Ingest a stimulus for `tag` now.
    pub fn fire(&self, tag: &str) -> Result<FireOutcome> {
        self.fire_at(tag, Instant::now())
    }

    /// Ingest a stimulus for `tag`. Timed actions toggle their timer; all
    /// other actions run their queue once.
    pub fn fire_at(&self, tag: &str, now: Instant) -> Result<FireOutcome> {
        let _guard = DispatchGuard::enter(&self.dispatching, tag)?;
        let action = self.registry.lookup(tag)?;
        if action.spec.passive {
            return Err(EngineError::Passive(tag.to_string()));
        }

        if action.spec.timer {
            let interval = self.interval_of(action);
            let toggle = self.timers.borrow_mut().toggle(tag, interval, now);
            info!(action = %tag, ?toggle, interval_ms = interval.as_millis() as u64, "timer toggled");
            return Ok(match toggle {
                Toggle::Started => FireOutcome::TimerStarted,
                Toggle::Stopped => FireOutcome::TimerStopped,
            });
        }

        Ok(FireOutcome::Dispatched(self.run_queue(action)))
    }

    /// Fire every active action bound to the key sequence `key`, in tag order.
    pub fn fire_key(&self, key: &str) -> Result<Vec<(String, FireOutcome)>> {
        let tags: Vec<String> = self
            .registry
            .active_for_key(key)
            .into_iter()
            .map(|a| a.tag().to_string())
            .collect();
        if tags.is_empty() {
            debug!(key, "no action bound to key");
        }
        let now = Instant::now();
        let mut fired = Vec::with_capacity(tags.len());
        for tag in tags {
            let outcome = self.fire_at(&tag, now)?;
            fired.push((tag, outcome));
        }
        Ok(fired)
    }

    /// Run the queue of every timer due at `now`.
    pub fn tick(&self, now: Instant) -> Result<Vec<DispatchSummary>> {
        let _guard = DispatchGuard::enter(&self.dispatching, "timer tick")?;
        let due = self.timers.borrow_mut().due(now);
        let mut summaries = Vec::with_capacity(due.len());
        for tag in due {
            if !self.timers.borrow().is_running(&tag) {
                continue;
            }
            let action = self.registry.lookup(&tag)?;
            summaries.push(self.run_queue(action));
        }
        Ok(summaries)
    }

    /// Ordered queue for `active_tag`: before-group, the action, after-group.
    pub fn collect_queue(&self, active_tag: &str) -> Result<Vec<&Action>> {
        let active = self.registry.lookup(active_tag)?;
        Ok(self.queue_for(active))
    }

    fn queue_for<'a>(&'a self, active: &'a Action) -> Vec<&'a Action> {
        let mut before = Vec::new();
        let mut after = Vec::new();
        for tag in self.registry.passive_order() {
            let Ok(passive) = self.registry.lookup(tag) else {
                continue;
            };
            if !passive.spec.trigger.listens_to(active.tag()) {
                continue;
            }
            if passive.spec.before_trigger {
                before.push(passive);
            } else {
                after.push(passive);
            }
        }

        let mut queue = before;
        queue.push(active);
        queue.extend(after);
        queue
    }

    fn run_queue(&self, active: &Action) -> DispatchSummary {
        let queue = self.queue_for(active);
        debug!(
            trigger = %active.tag(),
            queue = ?queue.iter().map(|a| a.tag()).collect::<Vec<_>>(),
            "running action queue"
        );
        let reports = queue
            .into_iter()
            .map(|action| ActionReport {
                tag: action.tag().to_string(),
                outcome: self.execute_one(action),
            })
            .collect();
        DispatchSummary {
            trigger: active.tag().to_string(),
            reports,
        }
    }

    /// Resolve inputs, invoke, validate, then commit all-or-nothing.
    ///
    /// Every validated value is stored before any change hook runs, so a
    /// hook never observes a partially applied commit. Hooks then run in
    /// `returns` order. Only failed slot checks stop a running timer; an
    /// arity mismatch is reported and the timer keeps going.
    fn execute_one(&self, action: &Action) -> ActionOutcome {
        let spec = &action.spec;
        let Some(func) = &action.func else {
            debug!(action = %spec.tag, "unbound action skipped");
            return ActionOutcome::Unbound;
        };

        let inputs = match self.resolve_inputs(action) {
            Ok(inputs) => inputs,
            Err(err) => {
                warn!(action = %spec.tag, error = %err, "action skipped");
                return ActionOutcome::Failed(err);
            }
        };

        let output = func(inputs, &spec.optionals);

        let plan = {
            let store = self.store.borrow();
            let prefs = self.prefs.borrow();
            let view = StateView {
                hot: &store,
                prefs: &prefs,
            };
            plan_commit(&spec.tag, &spec.returns, output, &view)
        };

        if plan.is_rejected() {
            let violations = plan.violations();
            for violation in &violations {
                warn!(action = %spec.tag, "{violation}");
            }
            let slot_failed = matches!(plan, CommitPlan::Checked(_));
            let timer_stopped =
                slot_failed && spec.timer && self.timers.borrow_mut().stop(&spec.tag);
            if timer_stopped {
                info!(action = %spec.tag, "timer stopped after rejected update");
            }
            return ActionOutcome::Rejected {
                violations,
                timer_stopped,
            };
        }

        let writes = plan.into_writes();
        let written: Vec<String> = writes.iter().map(|(tag, _)| tag.clone()).collect();
        {
            let mut store = self.store.borrow_mut();
            for (tag, value) in writes {
                store.set(&tag, value);
            }
        }
        let store = self.store.borrow();
        for tag in &written {
            store.on_committed(tag);
        }
        debug!(action = %spec.tag, written = ?written, "committed");
        ActionOutcome::Committed { written }
    }

    fn resolve_inputs(&self, action: &Action) -> Result<Vec<Value>> {
        let store = self.store.borrow();
        let prefs = self.prefs.borrow();
        action
            .spec
            .inputs
            .iter()
            .map(|key| {
                if let Some(value) = store.get(key) {
                    Ok(value.into_owned())
                } else if let Some(value) = prefs.get(key) {
                    Ok(value.clone())
                } else {
                    Err(EngineError::MissingBinding {
                        action: action.spec.tag.clone(),
                        key: key.clone(),
                    })
                }
            })
            .collect()
    }

    /// Declared intervals are range-checked in [`Engine::new`]; only an
    /// undeclared one takes the engine default.
    fn interval_of(&self, action: &Action) -> Duration {
        match action.spec.timer_interval.and_then(interval_from_secs) {
            Some(interval) => interval,
            None => self.default_interval,
        }
    }

    /// Tags of running timers.
    pub fn list_active_timers(&self) -> BTreeSet<String> {
        self.timers.borrow().list_active()
    }

    /// Earliest pending timer deadline.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timers.borrow().next_deadline()
    }

    pub fn hot_value(&self, tag: &str) -> Option<Value> {
        self.store.borrow().get(tag).map(|v| v.into_owned())
    }

    pub fn hot_values(&self) -> BTreeMap<String, Value> {
        self.store.borrow().snapshot()
    }

    pub fn preference(&self, tag: &str) -> Option<Value> {
        self.prefs.borrow().get(tag).cloned()
    }

    /// Attach the change hook of a hot variable. Only allowed outside a
    /// dispatch.
    pub fn watch(&self, tag: &str, hook: impl Fn(&str, &Value) + 'static) -> Result<()> {
        let _guard = DispatchGuard::enter(&self.dispatching, tag)?;
        let mut store = self.store.borrow_mut();
        let mut var = store
            .variable(tag)
            .cloned()
            .ok_or_else(|| EngineError::UnknownHotVariable(tag.to_string()))?;
        var.on_change = Some(Rc::new(hook));
        store.insert(var)
    }

    /// Bootstrap write that bypasses the action protocol. The declared type
    /// is still enforced; no hook runs.
    pub fn seed(&self, tag: &str, value: Value) -> Result<()> {
        let _guard = DispatchGuard::enter(&self.dispatching, tag)?;
        let mut store = self.store.borrow_mut();
        let var = store
            .variable(tag)
            .ok_or_else(|| EngineError::UnknownHotVariable(tag.to_string()))?;
        let actual = value.value_type();
        if !var.declared.admits(actual) {
            return Err(EngineError::InitialType {
                tag: tag.to_string(),
                declared: var.declared,
                actual,
            });
        }
        store.set(tag, value);
        Ok(())
    }

    /// Update a preference from the configuration surface and run its hook.
    pub fn set_preference(&self, tag: &str, value: Value) -> Result<()> {
        let _guard = DispatchGuard::enter(&self.dispatching, tag)?;
        let hook = self.prefs.borrow_mut().update(tag, value)?;
        info!(preference = %tag, "preference updated");
        if let Some(hook) = hook {
            let prefs = self.prefs.borrow();
            if let Some(value) = prefs.get(tag) {
                hook(tag, value);
            }
        }
        Ok(())
    }

    /// Apply startup overrides; rejected entries are reported and skipped.
    pub fn apply_preference_overrides(&self, overrides: BTreeMap<String, Value>) -> Vec<EngineError> {
        let mut rejected = Vec::new();
        for (tag, value) in overrides {
            if let Err(err) = self.set_preference(&tag, value) {
                warn!(preference = %tag, error = %err, "override rejected");
                rejected.push(err);
            }
        }
        rejected
    }
}
