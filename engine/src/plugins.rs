//! Built-in action functions, linked by name from schema files.
//!
//! Functions never fail: malformed inputs produce a pass so the hot
//! variable they would have written stays as it is.

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::action::FunctionTable;
use crate::core::types::{Optionals, Output, Returned};
use crate::core::value::Value;

/// Every built-in function, keyed by its schema name.
pub fn builtin_functions() -> FunctionTable {
    let mut table = FunctionTable::new();
    table
        .register("toggle_pick_mode", toggle_pick_mode)
        .register("go_to_page", go_to_page)
        .register("toggle_trace_color", toggle_trace_color)
        .register("alternate_trace_color", alternate_trace_color)
        .register("alternate_sta_color_assign", alternate_sta_color_assign)
        .register("new_pick_dir", new_pick_dir)
        .register("toggle_test_sources", toggle_test_sources)
        .register("pan_percent", pan_percent);
    table
}

fn malformed(function: &str) -> Output {
    debug!(function, "inputs malformed, passing");
    Output::pass()
}

fn text_list(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

fn assignment(entries: &[(&str, &[&str])]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(key, items)| (key.to_string(), text_list(items)))
            .collect(),
    )
}

fn lists_contain(map: &BTreeMap<String, Value>, key: &str, needle: &str) -> bool {
    map.get(key)
        .and_then(Value::as_list)
        .is_some_and(|items| items.iter().any(|v| v.as_text() == Some(needle)))
}

/// Next pick mode in alphabetical order of the configured pick types.
///
/// Inputs: current mode, pick-type map.
pub fn toggle_pick_mode(inputs: Vec<Value>, _: &Optionals) -> Output {
    let (Some(current), Some(Value::Map(types))) = (inputs.first(), inputs.get(1)) else {
        return malformed("toggle_pick_mode");
    };
    let modes: Vec<&String> = types.keys().collect();
    if modes.is_empty() {
        return malformed("toggle_pick_mode");
    }
    let idx = current
        .as_text()
        .and_then(|c| modes.iter().position(|m| m.as_str() == c))
        .unwrap_or(0);
    let next = modes[(idx + 1) % modes.len()];
    debug!(mode = %next, "picking mode");
    Output::one(next.as_str())
}

/// First page, or a page far enough past the end when `go_to_page = "last"`.
pub fn go_to_page(_: Vec<Value>, optionals: &Optionals) -> Output {
    let last = optionals.get("go_to_page").and_then(Value::as_text) == Some("last");
    Output::one(if last { 99_999 } else { 0 })
}

/// Swap the vertical channel between the lowlight and highlight groups.
pub fn toggle_trace_color(inputs: Vec<Value>, _: &Optionals) -> Output {
    let Some(Value::Map(current)) = inputs.first() else {
        return malformed("toggle_trace_color");
    };
    let vertical: &[&str] = &["*Z"];
    let horizontals: &[&str] = &["*1", "*2", "*E", "*N"];
    if lists_contain(current, "lowlight", "*Z") {
        Output::one(assignment(&[("highlight", vertical), ("lowlight", horizontals)]))
    } else {
        Output::one(assignment(&[("lowlight", vertical), ("highlight", horizontals)]))
    }
}

/// Rotate the three component groups through `alt1`, `alt2`, `alt3`.
pub fn alternate_trace_color(inputs: Vec<Value>, _: &Optionals) -> Output {
    let Some(Value::Map(current)) = inputs.first() else {
        return malformed("alternate_trace_color");
    };
    let groups: [&[&str]; 3] = [&["*Z"], &["*2", "*N"], &["*1", "*E"]];
    let slots = ["alt1", "alt2", "alt3"];
    let shift = if !current.contains_key("alt1") {
        0
    } else if lists_contain(current, "alt1", "*Z") {
        1
    } else if lists_contain(current, "alt2", "*Z") {
        2
    } else {
        0
    };
    let entries: Vec<(&str, &[&str])> = groups
        .iter()
        .enumerate()
        .map(|(i, group)| (slots[(i + shift) % 3], *group))
        .collect();
    Output::one(assignment(&entries))
}

/// Split the sorted stations alternately between two colour groups,
/// flipping the parity on every call.
///
/// Inputs: current assignment map, station order list.
pub fn alternate_sta_color_assign(inputs: Vec<Value>, _: &Optionals) -> Output {
    let (Some(Value::Map(current)), Some(Value::List(order))) = (inputs.first(), inputs.get(1))
    else {
        return malformed("alternate_sta_color_assign");
    };
    if order.is_empty() {
        return Output::pass();
    }
    // Rows of station metadata carry the station name first.
    let stations: Vec<&Value> = order
        .iter()
        .map(|entry| match entry {
            Value::List(row) => row.first().unwrap_or(entry),
            other => other,
        })
        .collect();
    let parity = usize::from(
        current
            .get("alt1")
            .and_then(Value::as_list)
            .is_some_and(|alt1| alt1.contains(stations[0])),
    );

    let mut alt1 = Vec::new();
    let mut alt2 = Vec::new();
    for (i, station) in stations.into_iter().enumerate() {
        if i % 2 == parity {
            alt1.push(station.clone());
        } else {
            alt2.push(station.clone());
        }
    }
    let mut next = BTreeMap::new();
    next.insert("alt1".to_string(), Value::List(alt1));
    next.insert("alt2".to_string(), Value::List(alt2));
    Output::one(next)
}

pub fn new_pick_dir(inputs: Vec<Value>, _: &Optionals) -> Output {
    match inputs.first().and_then(Value::as_text) {
        Some(main_path) => Output::one(format!("{main_path}/NewPickDir")),
        None => malformed("new_pick_dir"),
    }
}

pub fn toggle_test_sources(inputs: Vec<Value>, _: &Optionals) -> Output {
    let current = inputs.first().and_then(Value::as_text);
    Output::one(if current == Some("testing") {
        "testing2"
    } else {
        "testing"
    })
}

/// Shift a `[start, end]` time range by `percent` of its width.
///
/// Optionals: `percent` (number), `direct` (`"forward"` or `"backward"`).
pub fn pan_percent(inputs: Vec<Value>, optionals: &Optionals) -> Output {
    let range = inputs
        .first()
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(Value::as_number).collect::<Vec<_>>());
    let Some([start, end]) = range.as_deref() else {
        return malformed("pan_percent");
    };
    let percent = optionals
        .get("percent")
        .and_then(Value::as_number)
        .unwrap_or(0.0);
    let mut delta = end - start;
    if optionals.get("direct").and_then(Value::as_text) == Some("backward") {
        delta = -delta;
    }
    let shift = percent / 100.0 * delta;
    Output::One(Returned::Value(Value::List(vec![
        Value::Float(start + shift),
        Value::Float(end + shift),
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(output: Output) -> Value {
        match output {
            Output::One(Returned::Value(value)) => value,
            other => panic!("expected one value, got {other:?}"),
        }
    }

    fn pick_types() -> Value {
        let mut types = BTreeMap::new();
        types.insert("P".to_string(), Value::Int(1));
        types.insert("S".to_string(), Value::Int(1));
        Value::Map(types)
    }

    /// Pick modes cycle alphabetically and wrap around.
    #[test]
    fn pick_mode_cycles() {
        let none = Optionals::new();
        assert_eq!(
            only(toggle_pick_mode(vec![Value::from("P"), pick_types()], &none)),
            Value::from("S")
        );
        assert_eq!(
            only(toggle_pick_mode(vec![Value::from("S"), pick_types()], &none)),
            Value::from("P")
        );
        // Unknown current mode starts from the first entry.
        assert_eq!(
            only(toggle_pick_mode(vec![Value::from("X"), pick_types()], &none)),
            Value::from("S")
        );
    }

    #[test]
    fn go_to_page_reads_optional() {
        let mut last = Optionals::new();
        last.insert("go_to_page".to_string(), Value::from("last"));
        assert_eq!(only(go_to_page(vec![], &last)), Value::Int(99_999));
        assert_eq!(only(go_to_page(vec![], &Optionals::new())), Value::Int(0));
    }

    /// Trace colour toggles between the two channel groupings.
    #[test]
    fn trace_color_toggles() {
        let none = Optionals::new();
        let first = only(toggle_trace_color(
            vec![Value::Map(BTreeMap::new())],
            &none,
        ));
        assert_eq!(
            first.as_map().and_then(|m| m.get("lowlight")),
            Some(&text_list(&["*Z"]))
        );
        let second = only(toggle_trace_color(vec![first], &none));
        assert_eq!(
            second.as_map().and_then(|m| m.get("highlight")),
            Some(&text_list(&["*Z"]))
        );
    }

    /// The vertical channel moves alt1 -> alt2 -> alt3 -> alt1.
    #[test]
    fn alternate_trace_color_rotates() {
        let none = Optionals::new();
        let mut current = Value::Map(BTreeMap::new());
        let mut owners = Vec::new();
        for _ in 0..4 {
            current = only(alternate_trace_color(vec![current], &none));
            let map = current.as_map().expect("map");
            let owner = ["alt1", "alt2", "alt3"]
                .into_iter()
                .find(|slot| lists_contain(map, slot, "*Z"))
                .expect("owner");
            owners.push(owner);
        }
        assert_eq!(owners, vec!["alt1", "alt2", "alt3", "alt1"]);
    }

    #[test]
    fn station_colors_alternate_parity() {
        let none = Optionals::new();
        let order = Value::List(vec![Value::from("A"), Value::from("B"), Value::from("C")]);
        let first = only(alternate_sta_color_assign(
            vec![Value::Map(BTreeMap::new()), order.clone()],
            &none,
        ));
        assert_eq!(
            first.as_map().and_then(|m| m.get("alt1")),
            Some(&text_list(&["A", "C"]))
        );
        let second = only(alternate_sta_color_assign(vec![first, order], &none));
        assert_eq!(
            second.as_map().and_then(|m| m.get("alt1")),
            Some(&text_list(&["B"]))
        );
    }

    /// No stations means leave the assignment alone.
    #[test]
    fn station_colors_pass_without_stations() {
        let output = alternate_sta_color_assign(
            vec![Value::Map(BTreeMap::new()), Value::List(vec![])],
            &Optionals::new(),
        );
        assert_eq!(output, Output::pass());
    }

    #[test]
    fn pan_percent_moves_both_edges() {
        let mut opts = Optionals::new();
        opts.insert("percent".to_string(), Value::Int(50));
        opts.insert("direct".to_string(), Value::from("backward"));
        let range = Value::List(vec![Value::Float(10.0), Value::Float(20.0)]);
        assert_eq!(
            only(pan_percent(vec![range], &opts)),
            Value::List(vec![Value::Float(5.0), Value::Float(15.0)])
        );
    }

    #[test]
    fn malformed_inputs_pass() {
        let none = Optionals::new();
        assert_eq!(pan_percent(vec![Value::Int(3)], &none), Output::pass());
        assert_eq!(toggle_trace_color(vec![], &none), Output::pass());
        assert_eq!(
            only(toggle_test_sources(vec![Value::from("testing")], &none)),
            Value::from("testing2")
        );
    }
}
