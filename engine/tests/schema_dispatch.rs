//! Schema-driven engine tests.
//!
//! Loads TOML schemas from disk, links the built-in functions and drives the
//! engine through stimuli, timers and preference overrides.

use std::time::{Duration, Instant};

use engine::core::types::{ActionOutcome, FireOutcome};
use engine::core::value::Value;
use engine::dispatch::Engine;
use engine::error::EngineError;
use engine::io::config::{load_preference_overrides, load_schema};
use engine::plugins::builtin_functions;
use engine::test_support::{PAGING_SCHEMA, TempSchema};

fn paging_engine() -> Engine {
    let file = TempSchema::new(PAGING_SCHEMA).expect("schema file");
    let schema = load_schema(file.path()).expect("load schema");
    Engine::from_schema(schema, &builtin_functions()).expect("engine")
}

/// Before-trigger passives run first, after-trigger passives last.
#[test]
fn paging_queue_wraps_active_action() {
    let engine = paging_engine();
    let queue: Vec<&str> = engine
        .collect_queue("PageLast")
        .expect("queue")
        .into_iter()
        .map(|a| a.tag())
        .collect();
    assert_eq!(queue, vec!["LogPage", "PageLast", "ClampPage"]);

    let queue: Vec<&str> = engine
        .collect_queue("PageFirst")
        .expect("queue")
        .into_iter()
        .map(|a| a.tag())
        .collect();
    assert_eq!(queue, vec!["PageFirst", "ClampPage"]);
}

/// A value outside the hot variable's check is rejected and nothing changes.
#[test]
fn out_of_range_page_is_rejected() {
    let engine = paging_engine();
    let FireOutcome::Dispatched(summary) = engine.fire("PageLast").expect("fire") else {
        panic!("PageLast is not timed");
    };
    assert_eq!(
        summary.violations(),
        vec![&EngineError::SemanticCheckFailed {
            action: "PageLast".to_string(),
            tag: "curPage".to_string(),
        }]
    );
    assert_eq!(summary.outcome("ClampPage"), Some(&ActionOutcome::Unbound));
    assert_eq!(engine.hot_value("curPage"), Some(Value::Int(0)));
}

/// Key stimuli resolve through the schema's key triggers.
#[test]
fn key_fires_bound_action() {
    let engine = paging_engine();
    let fired = engine.fire_key("Home").expect("fire key");
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, "PageFirst");
    assert!(engine.fire_key("PageDown").expect("unbound key").is_empty());
}

/// A timed action cycles the pick mode on each tick until stopped.
#[test]
fn timer_cycles_pick_mode() {
    let engine = paging_engine();
    let start = Instant::now();
    let step = Duration::from_millis(50);

    assert_eq!(
        engine.fire_at("CyclePickMode", start).expect("start"),
        FireOutcome::TimerStarted
    );
    assert!(engine.tick(start + step / 2).expect("early tick").is_empty());

    engine.tick(start + step).expect("tick 1");
    assert_eq!(engine.hot_value("pickMode"), Some(Value::from("S")));
    engine.tick(start + step * 2).expect("tick 2");
    assert_eq!(engine.hot_value("pickMode"), Some(Value::from("P")));

    assert_eq!(
        engine.fire_at("CyclePickMode", start + step * 3).expect("stop"),
        FireOutcome::TimerStopped
    );
    assert!(engine.tick(start + step * 10).expect("after stop").is_empty());
    assert_eq!(engine.hot_value("pickMode"), Some(Value::from("P")));
}

/// Missed ticks collapse into a single run.
#[test]
fn late_tick_runs_once() {
    let engine = paging_engine();
    let start = Instant::now();
    engine.fire_at("CyclePickMode", start).expect("start");
    let summaries = engine
        .tick(start + Duration::from_secs(1))
        .expect("late tick");
    assert_eq!(summaries.len(), 1);
    assert_eq!(engine.hot_value("pickMode"), Some(Value::from("S")));
}

/// Overrides from disk are validated against preference conditions.
#[test]
fn preference_overrides_apply_and_reject() {
    let file = TempSchema::new(PAGING_SCHEMA).expect("schema file");
    let engine =
        Engine::from_schema(load_schema(file.path()).expect("load"), &builtin_functions())
            .expect("engine");

    let good = file
        .write_sibling("good.toml", "lastPage = \"first\"\n")
        .expect("write");
    let overrides = load_preference_overrides(&good).expect("load");
    let rejected = engine.apply_preference_overrides(overrides);
    assert!(rejected.is_empty());
    assert_eq!(engine.preference("lastPage"), Some(Value::from("first")));

    let bad = file
        .write_sibling("bad.toml", "lastPage = \"middle\"\nghost = 1\n")
        .expect("write");
    let overrides = load_preference_overrides(&bad).expect("load");
    let rejected = engine.apply_preference_overrides(overrides);
    assert_eq!(rejected.len(), 2);
    assert_eq!(engine.preference("lastPage"), Some(Value::from("first")));
}

/// Cross-reference errors are collected and reported together.
#[test]
fn invalid_schema_lists_every_violation() {
    let file = TempSchema::new(
        r#"
passive_order = ["Missing"]

[[action]]
tag = "Clamp"
passive = true
trigger = { actions = ["Ghost"] }
returns = ["nowhere"]
"#,
    )
    .expect("schema file");
    let schema = load_schema(file.path()).expect("parse");
    let err = Engine::from_schema(schema, &builtin_functions())
        .err()
        .expect("invalid");
    let EngineError::InvalidSchema(errors) = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(errors.len(), 3);
    let message = err.to_string();
    assert!(message.contains("unknown trigger 'Ghost'"));
    assert!(message.contains("unknown hot variable 'nowhere'"));
    assert!(message.contains("'Missing' is not a declared passive action"));
}

/// A mistyped initial value fails before cross-reference checks run.
#[test]
fn mistyped_initial_value_fails_startup() {
    let file = TempSchema::new("[hot.curPage]\ntype = \"int\"\nvalue = \"zero\"\n")
        .expect("schema file");
    let schema = load_schema(file.path()).expect("parse");
    assert!(matches!(
        Engine::from_schema(schema, &builtin_functions()),
        Err(EngineError::InitialType { .. })
    ));
}

/// Timer intervals outside the supported range fail startup.
#[test]
fn unschedulable_timer_interval_fails_startup() {
    for secs in ["1e19", "1e-12"] {
        let file = TempSchema::new(&format!(
            "[[action]]\ntag = \"Poll\"\ntimer = true\ntimer_interval = {secs}\n"
        ))
        .expect("schema file");
        let schema = load_schema(file.path()).expect("parse");
        assert!(matches!(
            Engine::from_schema(schema, &builtin_functions()),
            Err(EngineError::InvalidSchema(ref errors))
                if matches!(errors[..], [EngineError::TimerInterval { .. }])
        ));
    }
}
