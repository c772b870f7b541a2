//! Load-time schema invariants.

use std::collections::HashSet;

use crate::core::action::{ActionRegistry, Trigger};
use crate::core::hot_vars::HotVariableStore;
use crate::core::timers::interval_from_secs;
use crate::error::EngineError;

/// Check cross-references between actions and hot variables:
/// - Passive triggers name declared actions
/// - Return tags name declared hot variables
/// - Passive order entries are declared passive actions, listed once
/// - Timer intervals fall within the timer bounds
pub fn validate_schema(registry: &ActionRegistry, store: &HotVariableStore) -> Vec<EngineError> {
    let mut errors = Vec::new();

    for action in registry.iter() {
        let spec = &action.spec;
        if let Trigger::Actions(tags) = &spec.trigger {
            for trigger in tags {
                if !registry.contains(trigger) {
                    errors.push(EngineError::UnknownTrigger {
                        action: spec.tag.clone(),
                        trigger: trigger.clone(),
                    });
                }
            }
        }

        for tag in &spec.returns {
            if !store.contains(tag) {
                errors.push(EngineError::UnknownReturn {
                    action: spec.tag.clone(),
                    tag: tag.clone(),
                });
            }
        }

        if spec.timer {
            if let Some(secs) = spec.timer_interval {
                if interval_from_secs(secs).is_none() {
                    errors.push(EngineError::TimerInterval {
                        action: spec.tag.clone(),
                        secs,
                    });
                }
            }
        }
    }

    let mut seen = HashSet::new();
    for tag in registry.passive_order() {
        let is_passive = registry
            .lookup(tag)
            .map(|a| a.spec.passive)
            .unwrap_or(false);
        if !is_passive || !seen.insert(tag.as_str()) {
            errors.push(EngineError::NotPassive(tag.clone()));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::ActionSpec;
    use crate::core::hot_vars::HotVariable;
    use crate::core::value::ValueType;

    fn store() -> HotVariableStore {
        let mut store = HotVariableStore::new();
        store
            .insert(HotVariable::new("curPage", 0, ValueType::Int))
            .expect("insert");
        store
    }

    #[test]
    fn valid_schema_has_no_errors() {
        let registry = ActionRegistry::new(
            vec![
                ActionSpec::active("PageNext").returns(["curPage"]),
                ActionSpec::passive("Clamp", ["PageNext"], false).returns(["curPage"]),
            ],
            None,
        )
        .expect("registry");
        assert!(validate_schema(&registry, &store()).is_empty());
    }

    /// A passive trigger naming an undeclared action fails startup.
    #[test]
    fn reports_unknown_trigger() {
        let registry = ActionRegistry::new(
            vec![ActionSpec::passive("Clamp", ["Ghost"], false)],
            None,
        )
        .expect("registry");
        assert_eq!(
            validate_schema(&registry, &store()),
            vec![EngineError::UnknownTrigger {
                action: "Clamp".to_string(),
                trigger: "Ghost".to_string(),
            }]
        );
    }

    #[test]
    fn reports_unknown_return() {
        let registry =
            ActionRegistry::new(vec![ActionSpec::active("A").returns(["ghost"])], None)
                .expect("registry");
        assert_eq!(
            validate_schema(&registry, &store()),
            vec![EngineError::UnknownReturn {
                action: "A".to_string(),
                tag: "ghost".to_string(),
            }]
        );
    }

    /// Ordering entries must be declared passive actions, each listed once.
    #[test]
    fn reports_bad_passive_order_entries() {
        let registry = ActionRegistry::new(
            vec![
                ActionSpec::active("A"),
                ActionSpec::passive("P", ["A"], false),
            ],
            Some(vec![
                "P".to_string(),
                "A".to_string(),
                "Ghost".to_string(),
                "P".to_string(),
            ]),
        )
        .expect("registry");
        assert_eq!(
            validate_schema(&registry, &store()),
            vec![
                EngineError::NotPassive("A".to_string()),
                EngineError::NotPassive("Ghost".to_string()),
                EngineError::NotPassive("P".to_string()),
            ]
        );
    }

    /// Intervals that cannot be scheduled are rejected at load time.
    #[test]
    fn reports_out_of_range_timer_intervals() {
        let registry = ActionRegistry::new(
            vec![
                ActionSpec::active("Huge").timed(1.0e19),
                ActionSpec::active("Tiny").timed(1.0e-12),
                ActionSpec::active("Ok").timed(0.05),
            ],
            None,
        )
        .expect("registry");
        assert_eq!(
            validate_schema(&registry, &store()),
            vec![
                EngineError::TimerInterval {
                    action: "Huge".to_string(),
                    secs: 1.0e19,
                },
                EngineError::TimerInterval {
                    action: "Tiny".to_string(),
                    secs: 1.0e-12,
                },
            ]
        );
    }

    #[test]
    fn reports_non_positive_timer_interval() {
        let registry = ActionRegistry::new(vec![ActionSpec::active("Poll").timed(0.0)], None)
            .expect("registry");
        assert_eq!(
            validate_schema(&registry, &store()),
            vec![EngineError::TimerInterval {
                action: "Poll".to_string(),
                secs: 0.0,
            }]
        );
    }
}
