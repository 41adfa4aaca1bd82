// Parameter recovery: map a test case's named inputs onto a function's declared parameters
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashSet};

use crate::family::{AliasGroup, Derive, FamilyProfile};
use crate::primitives::{node_names, Primitive};

/// Where parameter values can come from, in lookup order
#[derive(Debug, Clone, Copy)]
pub struct ParamSources<'a> {
    pub inputs: &'a Map<String, Value>,
    /// The family's structured level data, if the level has any
    pub level_data: Option<&'a Value>,
    pub graph_map: &'a Value,
    pub all_nodes: &'a Value,
}

impl<'a> ParamSources<'a> {
    fn input_key(&self, consumed: &HashSet<String>, accept: impl Fn(&str) -> bool) -> Option<&'a String> {
        self.inputs
            .keys()
            .find(|key| !consumed.contains(key.as_str()) && accept(key.as_str()))
            .or_else(|| self.inputs.keys().find(|key| accept(key.as_str())))
    }

    fn level_lookup(&self, name: &str, group: Option<&AliasGroup>) -> Option<Value> {
        let data = self.level_data?.as_object()?;
        if let Some(value) = data.get(name) {
            return Some(value.clone());
        }
        if let Some((_, value)) = data.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            return Some(value.clone());
        }
        let group = group?;
        data.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(group.slot) || group.matches(key))
            .map(|(_, value)| value.clone())
    }

    /// Value of a named slot from the inputs or the level data
    fn slot_value(&self, profile: &FamilyProfile, slot: &str) -> Option<Value> {
        let group = profile.aliases.iter().find(|g| g.slot == slot);
        let in_inputs = self
            .inputs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(slot) || group.is_some_and(|g| g.matches(key)));
        match in_inputs {
            Some((_, value)) => Some(value.clone()),
            None => self.level_lookup(slot, group),
        }
    }

    fn graph(&self) -> Option<Value> {
        if !self.graph_map.is_null() {
            return Some(self.graph_map.clone());
        }
        let data = self.level_data?.as_object()?;
        data.get("graph")
            .or_else(|| data.get("adjacency"))
            .or_else(|| data.get("adjacencyList"))
            .cloned()
    }

    fn nodes(&self) -> Option<Value> {
        if self.all_nodes.as_array().is_some_and(|nodes| !nodes.is_empty()) {
            return Some(self.all_nodes.clone());
        }
        self.graph().map(|graph| Value::Array(node_names(&graph)))
    }

    fn derive(&self, derive: Derive, profile: &FamilyProfile) -> Option<Value> {
        match derive {
            Derive::Zero => Some(json!(0)),
            Derive::LengthOf(slot) => self
                .slot_value(profile, slot)
                .and_then(|value| value.as_array().map(|items| json!(items.len()))),
            Derive::EmptyArray => Some(json!([])),
            Derive::EmptyObject => Some(json!({})),
            Derive::EmptyBoard => board_size(profile, self).map(empty_board),
            Derive::GraphMap => self.graph(),
            Derive::NodeList => self.nodes(),
            Derive::EdgeList => self.graph().map(|graph| Primitive::GetAllEdges.invoke(&[graph])),
        }
    }
}

/// Positional arguments for `params`.
///
/// Per parameter: exact input name, case-insensitive name, alias group,
/// family default, next unconsumed input, level data, graph/node list, null.
pub fn bind_parameters(params: &[String], profile: &FamilyProfile, sources: &ParamSources<'_>) -> Vec<Value> {
    let mut consumed: HashSet<String> = HashSet::new();
    let mut pending: Vec<Option<Value>> = Vec::with_capacity(params.len());

    // Named lookups first so positional fallback only sees leftovers
    for param in params {
        let group = profile.alias_for(param);
        let key = sources
            .input_key(&consumed, |key| key == param.as_str())
            .or_else(|| sources.input_key(&consumed, |key| key.eq_ignore_ascii_case(param)))
            .or_else(|| {
                let group = group?;
                sources.input_key(&consumed, |key| key.eq_ignore_ascii_case(group.slot) || group.matches(key))
            });

        let value = match key {
            Some(key) => {
                consumed.insert(key.clone());
                sources.inputs.get(key).cloned()
            }
            None => group
                .and_then(|g| g.derive)
                .and_then(|derive| sources.derive(derive, profile)),
        };
        pending.push(value);
    }

    let mut leftovers = sources
        .inputs
        .iter()
        .filter(|(key, _)| !consumed.contains(key.as_str()))
        .map(|(_, value)| value.clone());

    params
        .iter()
        .zip(pending)
        .map(|(param, bound)| {
            bound
                .or_else(|| leftovers.next())
                .or_else(|| sources.level_lookup(param, profile.alias_for(param)))
                .or_else(|| fallback_by_name(param, sources))
                .unwrap_or(Value::Null)
        })
        .collect()
}

fn fallback_by_name(param: &str, sources: &ParamSources<'_>) -> Option<Value> {
    let lower = param.to_ascii_lowercase();
    if lower.contains("graph") || lower.starts_with("adj") {
        sources.graph()
    } else if lower.contains("node") || lower.contains("vert") {
        sources.nodes()
    } else {
        None
    }
}

/// Values for outer-scope names the generated program declares
///
/// Only shared identifiers and known aliases are bound; everything else stays `undefined`.
/// Names in `initialized` keep their own initializer unless the test inputs or the level
/// data supply a value.
pub fn bind_globals(
    names: &[String],
    initialized: &BTreeSet<String>,
    profile: &FamilyProfile,
    sources: &ParamSources<'_>,
) -> Vec<(String, Value)> {
    names
        .iter()
        .filter(|name| profile.is_shared(name) || profile.alias_for(name).is_some())
        .filter_map(|name| {
            let group = profile.alias_for(name);
            let from_inputs = sources
                .inputs
                .iter()
                .find(|(key, _)| {
                    key.eq_ignore_ascii_case(name)
                        || group.is_some_and(|g| key.eq_ignore_ascii_case(g.slot) || g.matches(key))
                })
                .map(|(_, value)| value.clone());
            let supplied = from_inputs.or_else(|| sources.level_lookup(name, group));
            let value = match supplied {
                Some(value) => value,
                None if initialized.contains(name.as_str()) => return None,
                None => group.and_then(|g| g.derive).and_then(|d| sources.derive(d, profile))?,
            };
            Some((name.clone(), value))
        })
        .collect()
}

/// Board size from the `n` slot
pub fn board_size(profile: &FamilyProfile, sources: &ParamSources<'_>) -> Option<u64> {
    sources.slot_value(profile, "n").and_then(|value| match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub fn empty_board(n: u64) -> Value {
    let n = n.min(64) as usize;
    Value::Array(vec![Value::Array(vec![json!(0); n]); n])
}
