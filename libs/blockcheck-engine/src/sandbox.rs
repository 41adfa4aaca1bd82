/// Sandbox Context Builder
///
/// Decides which names learner code can see and what each one does. The map
/// is rendered into a JavaScript prelude by `render_prelude`; the executor
/// owns the counters and bridge the prelude refers to (`__tick`,
/// `__checkDeadline`, `__primitive`).

use blockcheck_common::types::AlgorithmFamily;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::primitives::Primitive;

/// Animation and UI calls; harmless here but each one costs a call from the budget
pub const MOVEMENTS: [&str; 20] = [
    "moveForward",
    "turnLeft",
    "turnRight",
    "moveToNode",
    "moveAlongPath",
    "jump",
    "collectItem",
    "highlightNode",
    "highlightEdge",
    "markVisited",
    "showPath",
    "drawEdge",
    "delay",
    "wait",
    "say",
    "showResult",
    "placeQueenVisual",
    "removeQueenVisual",
    "highlightCell",
    "updateTable",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Capability {
    /// Counted and deadline-checked, returns a promise of `true`
    ///
    /// Not an `async function`: the budget check must throw synchronously so an
    /// un-awaited call inside a plain loop still stops the loop.
    Movement,
    /// Returns a fixed value
    Sensor(Value),
    Primitive(Primitive),
    /// Plain global binding
    Data(Value),
}

impl Capability {
    fn render(&self, name: &str) -> String {
        match self {
            Capability::Movement => format!(
                "function {name}() {{ __tick(\"{name}\"); return Promise.resolve(true); }}"
            ),
            Capability::Sensor(value) => format!(
                "function {name}() {{ __checkDeadline(); return {}; }}",
                js_literal(value)
            ),
            Capability::Primitive(primitive) if primitive.name() == name => {
                primitive.js_adapter().to_string()
            }
            // Renamed primitive: keep the adapter and alias it
            Capability::Primitive(primitive) => format!(
                "{}\nvar {name} = {};",
                primitive.js_adapter(),
                primitive.name()
            ),
            Capability::Data(value) => format!("var {name} = {};", js_literal(value)),
        }
    }
}

/// JSON is a valid JavaScript expression for every value serde_json can produce
pub fn js_literal(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityMap {
    entries: BTreeMap<String, Capability>,
}

impl CapabilityMap {
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, capability: Capability) {
        self.entries.insert(name.into(), capability);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Capability)> {
        self.entries.iter()
    }

    /// Data bindings first so functions can close over them, then everything else
    pub fn render_prelude(&self) -> String {
        let (data, callables): (Vec<_>, Vec<_>) = self
            .entries
            .iter()
            .partition(|(_, capability)| matches!(capability, Capability::Data(_)));

        data.into_iter()
            .chain(callables)
            .map(|(name, capability)| capability.render(name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain assignments re-applying every data binding over earlier initializers
    pub fn render_data_assignments(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(name, capability)| match capability {
                Capability::Data(value) => Some(format!("{name} = {};", js_literal(value))),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn build(family: AlgorithmFamily, overrides: &BTreeMap<String, Capability>) -> CapabilityMap {
    let mut map = CapabilityMap::default();

    for name in MOVEMENTS {
        map.insert(name, Capability::Movement);
    }
    map.insert("isAtGoal", Capability::Sensor(json!(false)));
    map.insert("canMoveForward", Capability::Sensor(json!(true)));
    map.insert("getCurrentNode", Capability::Sensor(Value::Null));
    map.insert("foundItem", Capability::Sensor(json!(false)));
    map.insert("getItemCount", Capability::Sensor(json!(0)));

    let graph_level = matches!(family, AlgorithmFamily::Graph | AlgorithmFamily::Generic);
    for primitive in Primitive::ALL {
        if graph_level || !primitive.is_graph() {
            map.insert(primitive.name(), Capability::Primitive(primitive));
        }
    }

    for (name, capability) in overrides {
        map.insert(name.clone(), capability.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_levels_get_graph_primitives() {
        let map = build(AlgorithmFamily::Graph, &BTreeMap::new());
        assert_eq!(
            map.get("getNeighbors"),
            Some(&Capability::Primitive(Primitive::GetNeighbors))
        );
        assert_eq!(map.get("moveForward"), Some(&Capability::Movement));
        assert_eq!(map.get("canMoveForward"), Some(&Capability::Sensor(json!(true))));
    }

    #[test]
    fn test_non_graph_levels_are_scoped() {
        let map = build(AlgorithmFamily::Knapsack, &BTreeMap::new());
        assert!(!map.contains("dsuUnion"));
        assert!(map.contains("findMaxIndex"));
        assert!(map.contains("captureSolution"));
    }

    #[test]
    fn test_overrides_replace_and_add() {
        let mut overrides = BTreeMap::new();
        overrides.insert("isAtGoal".to_string(), Capability::Sensor(json!(true)));
        overrides.insert("levelTarget".to_string(), Capability::Data(json!(7)));
        let map = build(AlgorithmFamily::SubsetSum, &overrides);
        assert_eq!(map.get("isAtGoal"), Some(&Capability::Sensor(json!(true))));
        assert_eq!(map.get("levelTarget"), Some(&Capability::Data(json!(7))));
    }

    #[test]
    fn test_overrides_deserialize_from_json() {
        let overrides: BTreeMap<String, Capability> = serde_json::from_value(json!({
            "getCurrentNode": {"kind": "sensor", "value": "A"},
            "nearest": {"kind": "primitive", "value": "findMinIndex"},
            "celebrate": {"kind": "movement"}
        }))
        .unwrap();
        assert_eq!(overrides["getCurrentNode"], Capability::Sensor(json!("A")));
        assert_eq!(overrides["nearest"], Capability::Primitive(Primitive::FindMinIndex));
        assert_eq!(overrides["celebrate"], Capability::Movement);
    }

    #[test]
    fn test_prelude_renders_data_before_functions() {
        let mut map = CapabilityMap::default();
        map.insert("say", Capability::Movement);
        map.insert("zeta", Capability::Data(json!({"A": ["B"]})));
        let prelude = map.render_prelude();
        let data_at = prelude.find("var zeta = {\"A\":[\"B\"]};").unwrap();
        let say_at = prelude.find("function say()").unwrap();
        assert!(data_at < say_at);
        assert!(prelude.contains("__tick(\"say\"); return Promise.resolve(true);"));
        assert!(!prelude.contains("async function say"));
    }

    #[test]
    fn test_data_assignments_skip_callables() {
        let mut map = CapabilityMap::default();
        map.insert("moveForward", Capability::Movement);
        map.insert("memo", Capability::Data(json!({"1": 1})));
        map.insert("N", Capability::Data(json!(4)));
        assert_eq!(map.render_data_assignments(), "N = 4;\nmemo = {\"1\":1};");
    }
}
