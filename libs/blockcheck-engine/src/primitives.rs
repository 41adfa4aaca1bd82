//! Algorithm primitives exposed to learner code.
//!
//! These are real implementations, not no-ops: a learner's Dijkstra only
//! produces the right distances if `findMinIndex` really finds the minimum.
//! Everything here works on JSON values so the sandbox bridge can hand
//! arguments across as serialized text.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Primitive {
    FindMinIndex,
    FindMaxIndex,
    DsuFind,
    DsuUnion,
    SortEdgesByWeight,
    GetNeighbors,
    GetNeighborsWithWeight,
    GetAllNodes,
    GetAllEdges,
    CaptureSolution,
}

impl Primitive {
    pub const ALL: [Primitive; 10] = [
        Primitive::FindMinIndex,
        Primitive::FindMaxIndex,
        Primitive::DsuFind,
        Primitive::DsuUnion,
        Primitive::SortEdgesByWeight,
        Primitive::GetNeighbors,
        Primitive::GetNeighborsWithWeight,
        Primitive::GetAllNodes,
        Primitive::GetAllEdges,
        Primitive::CaptureSolution,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::FindMinIndex => "findMinIndex",
            Primitive::FindMaxIndex => "findMaxIndex",
            Primitive::DsuFind => "dsuFind",
            Primitive::DsuUnion => "dsuUnion",
            Primitive::SortEdgesByWeight => "sortEdgesByWeight",
            Primitive::GetNeighbors => "getNeighbors",
            Primitive::GetNeighborsWithWeight => "getNeighborsWithWeight",
            Primitive::GetAllNodes => "getAllNodes",
            Primitive::GetAllEdges => "getAllEdges",
            Primitive::CaptureSolution => "captureSolution",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Whether the primitive only makes sense on graph levels
    pub fn is_graph(&self) -> bool {
        !matches!(
            self,
            Primitive::FindMinIndex | Primitive::FindMaxIndex | Primitive::CaptureSolution
        )
    }

    /// JavaScript adapter binding the learner-facing name to the native bridge
    pub fn js_adapter(&self) -> &'static str {
        match self {
            Primitive::FindMinIndex => {
                "function findMinIndex(values, mask) { return __primitive(\"findMinIndex\", [values, mask]); }"
            }
            Primitive::FindMaxIndex => {
                "function findMaxIndex(values, mask) { return __primitive(\"findMaxIndex\", [values, mask]); }"
            }
            Primitive::DsuFind => {
                "function dsuFind(parent, x) { return __primitive(\"dsuFind\", [parent, x]); }"
            }
            Primitive::DsuUnion => {
                r#"function dsuUnion(parent, a, b) {
  var merge = __primitive("dsuUnion", [parent, a, b]);
  if (merge.merged) { parent[merge.child] = merge.root; }
  return merge.merged;
}"#
            }
            Primitive::SortEdgesByWeight => {
                "function sortEdgesByWeight(edges) { return __primitive(\"sortEdgesByWeight\", [edges]); }"
            }
            Primitive::GetNeighbors => {
                r#"function getNeighbors(a, b) {
  return arguments.length < 2 ? __primitive("getNeighbors", [__graph, a]) : __primitive("getNeighbors", [a, b]);
}"#
            }
            Primitive::GetNeighborsWithWeight => {
                r#"function getNeighborsWithWeight(a, b) {
  return arguments.length < 2 ? __primitive("getNeighborsWithWeight", [__graph, a]) : __primitive("getNeighborsWithWeight", [a, b]);
}"#
            }
            Primitive::GetAllNodes => {
                "function getAllNodes(g) { return __primitive(\"getAllNodes\", [g === undefined ? __graph : g, __nodes]); }"
            }
            Primitive::GetAllEdges => {
                "function getAllEdges(g) { return __primitive(\"getAllEdges\", [g === undefined ? __graph : g]); }"
            }
            Primitive::CaptureSolution => {
                r#"function captureSolution(value) {
  __captured.push(JSON.parse(JSON.stringify(value === undefined ? null : __plain(value))));
  return true;
}"#
            }
        }
    }

    /// Run the primitive over already-decoded arguments
    pub fn invoke(&self, args: &[Value]) -> Value {
        let arg = |i: usize| args.get(i).unwrap_or(&NULL);
        match self {
            Primitive::FindMinIndex => find_extreme_index(arg(0), arg(1), Extreme::Min),
            Primitive::FindMaxIndex => find_extreme_index(arg(0), arg(1), Extreme::Max),
            Primitive::DsuFind => dsu_find(arg(0), arg(1)),
            Primitive::DsuUnion => dsu_union(arg(0), arg(1), arg(2)),
            Primitive::SortEdgesByWeight => sort_edges_by_weight(arg(0)),
            Primitive::GetNeighbors => Value::Array(
                neighbors_with_weight(arg(0), arg(1))
                    .into_iter()
                    .map(|(node, _)| node)
                    .collect(),
            ),
            Primitive::GetNeighborsWithWeight => Value::Array(
                neighbors_with_weight(arg(0), arg(1))
                    .into_iter()
                    .map(|(node, weight)| json!([node, weight]))
                    .collect(),
            ),
            Primitive::GetAllNodes => all_nodes(arg(0), arg(1)),
            Primitive::GetAllEdges => all_edges(arg(0)),
            // Handled entirely inside the sandbox
            Primitive::CaptureSolution => Value::Bool(true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Min,
    Max,
}

/// Numeric view of a value; JSON has no Infinity, so `null` stands in for it
fn numeric(value: &Value, extreme: Extreme) -> f64 {
    let unbounded = match extreme {
        Extreme::Min => f64::INFINITY,
        Extreme::Max => f64::NEG_INFINITY,
    };
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(unbounded),
        Value::String(s) => s.trim().parse().unwrap_or(unbounded),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => unbounded,
    }
}

fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Excluded positions/keys from a mask argument
///
/// Booleans are positional (`true` means excluded, as in a `visited` array);
/// anything else lists excluded indices or keys.
fn excluded(mask: &Value) -> HashSet<String> {
    match mask {
        Value::Array(items) if items.iter().all(Value::is_boolean) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(i, _)| i.to_string())
            .collect(),
        Value::Array(items) => items.iter().map(key_string).collect(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| k.clone())
            .collect(),
        _ => HashSet::new(),
    }
}

/// First index (or key) holding the extreme value among non-excluded entries, `-1` if none
fn find_extreme_index(values: &Value, mask: &Value, extreme: Extreme) -> Value {
    let skip = excluded(mask);
    let entries: Vec<(Value, f64)> = match values {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(i, _)| !skip.contains(&i.to_string()))
            .map(|(i, v)| (json!(i), numeric(v, extreme)))
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter(|(k, _)| !skip.contains(k.as_str()))
            .map(|(k, v)| (Value::String(k.clone()), numeric(v, extreme)))
            .collect(),
        _ => Vec::new(),
    };

    let mut best: Option<(Value, f64)> = None;
    for (key, value) in entries {
        let better = match &best {
            None => true,
            Some((_, current)) => match extreme {
                Extreme::Min => value < *current,
                Extreme::Max => value > *current,
            },
        };
        if better {
            best = Some((key, value));
        }
    }
    best.map(|(key, _)| key).unwrap_or(json!(-1))
}

fn parent_of<'a>(parent: &'a Value, x: &Value) -> Option<&'a Value> {
    match parent {
        Value::Array(items) => x.as_u64().and_then(|i| items.get(i as usize)),
        Value::Object(map) => map.get(&key_string(x)),
        _ => None,
    }
}

fn same_node(a: &Value, b: &Value) -> bool {
    a == b || key_string(a) == key_string(b)
}

/// Root of `x`; a missing entry is its own root, and cycles stop after one lap
fn dsu_find(parent: &Value, x: &Value) -> Value {
    let bound = match parent {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 0,
    };
    let mut current = x.clone();
    for _ in 0..=bound {
        match parent_of(parent, &current) {
            Some(next) if !same_node(next, &current) => current = next.clone(),
            _ => break,
        }
    }
    current
}

/// `{root, child, merged}`; the caller attaches `child` under `root`
fn dsu_union(parent: &Value, a: &Value, b: &Value) -> Value {
    let root_a = dsu_find(parent, a);
    let root_b = dsu_find(parent, b);
    if same_node(&root_a, &root_b) {
        return json!({"root": root_a, "child": Value::Null, "merged": false});
    }
    json!({"root": root_a, "child": root_b, "merged": true})
}

fn edge_weight(edge: &Value) -> f64 {
    match edge {
        Value::Array(parts) => parts.get(2).map(|w| numeric(w, Extreme::Min)).unwrap_or(f64::INFINITY),
        Value::Object(map) => map
            .get("weight")
            .or_else(|| map.get("w"))
            .or_else(|| map.get("cost"))
            .map(|w| numeric(w, Extreme::Min))
            .unwrap_or(f64::INFINITY),
        _ => f64::INFINITY,
    }
}

/// Stable ascending sort by weight
fn sort_edges_by_weight(edges: &Value) -> Value {
    let Value::Array(items) = edges else {
        return Value::Array(Vec::new());
    };
    let mut sorted = items.clone();
    sorted.sort_by(|a, b| {
        edge_weight(a)
            .partial_cmp(&edge_weight(b))
            .unwrap_or(Ordering::Equal)
    });
    Value::Array(sorted)
}

fn adjacency<'a>(graph: &'a Value, node: &Value) -> Option<&'a Value> {
    match graph {
        Value::Object(map) => map.get(&key_string(node)),
        Value::Array(lists) => node.as_u64().and_then(|i| lists.get(i as usize)),
        _ => None,
    }
}

/// Neighbours of `node` with their edge weights (1 when unweighted)
///
/// Accepts name lists, `{neighbour: weight}` maps, `{node, weight}` records
/// and `[node, weight]` pairs.
fn neighbors_with_weight(graph: &Value, node: &Value) -> Vec<(Value, Value)> {
    match adjacency(graph, node) {
        Some(Value::Object(map)) => map.iter().map(|(k, w)| (Value::String(k.clone()), w.clone())).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(record) => {
                    let target = record.get("node").or_else(|| record.get("to")).or_else(|| record.get("target"))?;
                    let weight = record.get("weight").or_else(|| record.get("w")).cloned().unwrap_or(json!(1));
                    Some((target.clone(), weight))
                }
                Value::Array(pair) => Some((pair.first()?.clone(), pair.get(1).cloned().unwrap_or(json!(1)))),
                other => Some((other.clone(), json!(1))),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Every node of the graph, keys first, then nodes only seen as neighbours
fn all_nodes(graph: &Value, known: &Value) -> Value {
    let mut nodes: Vec<Value> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |node: Value, nodes: &mut Vec<Value>| {
        if seen.insert(key_string(&node)) {
            nodes.push(node);
        }
    };

    if let Value::Array(listed) = known {
        for node in listed {
            push(node.clone(), &mut nodes);
        }
    }
    match graph {
        Value::Object(map) => {
            for key in map.keys() {
                push(Value::String(key.clone()), &mut nodes);
            }
            for key in map.keys() {
                for (neighbor, _) in neighbors_with_weight(graph, &Value::String(key.clone())) {
                    push(neighbor, &mut nodes);
                }
            }
        }
        Value::Array(lists) => {
            for i in 0..lists.len() {
                push(json!(i), &mut nodes);
            }
        }
        _ => {}
    }
    Value::Array(nodes)
}

/// `[u, v, w]` triples; a symmetric adjacency yields each undirected edge once
fn all_edges(graph: &Value) -> Value {
    let sources: Vec<Value> = match graph {
        Value::Object(map) => map.keys().map(|k| Value::String(k.clone())).collect(),
        Value::Array(lists) => (0..lists.len()).map(|i| json!(i)).collect(),
        _ => Vec::new(),
    };
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut edges = Vec::new();
    for source in sources {
        for (target, weight) in neighbors_with_weight(graph, &source) {
            let (u, v, w) = (key_string(&source), key_string(&target), weight.to_string());
            if seen.contains(&(v.clone(), u.clone(), w.clone())) {
                continue;
            }
            seen.insert((u, v, w));
            edges.push(json!([source.clone(), target, weight]));
        }
    }
    Value::Array(edges)
}

/// Decode bridge arguments; unparseable text degrades to `null`
pub fn decode_args(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => vec![other],
        Err(_) => Vec::new(),
    }
}

/// Node names of a graph map, for callers outside the sandbox
pub fn node_names(graph: &Value) -> Vec<Value> {
    match all_nodes(graph, &Value::Null) {
        Value::Array(nodes) => nodes,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighted_graph() -> Value {
        json!({
            "A": {"B": 4, "C": 1},
            "B": {"A": 4, "D": 1},
            "C": {"A": 1, "B": 2, "D": 5},
            "D": {"B": 1, "C": 5}
        })
    }

    #[test]
    fn test_find_min_index_with_visited_mask() {
        let dist = json!([0, 4, 1, null]);
        assert_eq!(Primitive::FindMinIndex.invoke(&[dist.clone(), Value::Null]), json!(0));
        assert_eq!(
            Primitive::FindMinIndex.invoke(&[dist.clone(), json!([true, false, false, false])]),
            json!(2)
        );
        assert_eq!(Primitive::FindMinIndex.invoke(&[dist, json!([0, 1, 2, 3])]), json!(-1));
    }

    #[test]
    fn test_find_extremes_over_maps() {
        let dist = json!({"A": 3, "B": 1, "C": 7});
        assert_eq!(Primitive::FindMinIndex.invoke(&[dist.clone(), json!({"B": true})]), json!("A"));
        assert_eq!(Primitive::FindMaxIndex.invoke(&[dist, Value::Null]), json!("C"));
    }

    #[test]
    fn test_null_is_unbounded() {
        assert_eq!(Primitive::FindMaxIndex.invoke(&[json!([null, 2, 5])]), json!(2));
        assert_eq!(Primitive::FindMinIndex.invoke(&[json!([null, null])]), json!(0));
        assert_eq!(Primitive::FindMinIndex.invoke(&[json!([])]), json!(-1));
    }

    #[test]
    fn test_dsu_find_and_union() {
        let parent = json!([0, 0, 1, 3]);
        assert_eq!(Primitive::DsuFind.invoke(&[parent.clone(), json!(2)]), json!(0));
        assert_eq!(
            Primitive::DsuUnion.invoke(&[parent.clone(), json!(2), json!(3)]),
            json!({"root": 0, "child": 3, "merged": true})
        );
        assert_eq!(
            Primitive::DsuUnion.invoke(&[parent, json!(1), json!(2)])["merged"],
            json!(false)
        );
    }

    #[test]
    fn test_dsu_find_survives_cycles() {
        let parent = json!({"A": "B", "B": "A"});
        let root = Primitive::DsuFind.invoke(&[parent, json!("A")]);
        assert!(root == json!("A") || root == json!("B"));
    }

    #[test]
    fn test_sort_edges_is_stable() {
        let edges = json!([["A", "B", 4], ["C", "D", 1], ["B", "C", 4], {"u": "A", "v": "C", "weight": 2}]);
        assert_eq!(
            Primitive::SortEdgesByWeight.invoke(&[edges]),
            json!([["C", "D", 1], {"u": "A", "v": "C", "weight": 2}, ["A", "B", 4], ["B", "C", 4]])
        );
    }

    #[test]
    fn test_neighbors_across_graph_shapes() {
        let graph = weighted_graph();
        assert_eq!(Primitive::GetNeighbors.invoke(&[graph.clone(), json!("A")]), json!(["B", "C"]));
        assert_eq!(
            Primitive::GetNeighborsWithWeight.invoke(&[graph, json!("D")]),
            json!([["B", 1], ["C", 5]])
        );

        let unweighted = json!({"A": ["B", "C"], "B": ["A"]});
        assert_eq!(
            Primitive::GetNeighborsWithWeight.invoke(&[unweighted, json!("A")]),
            json!([["B", 1], ["C", 1]])
        );

        let records = json!({"A": [{"node": "B", "weight": 3}]});
        assert_eq!(Primitive::GetNeighbors.invoke(&[records, json!("A")]), json!(["B"]));
        assert_eq!(Primitive::GetNeighbors.invoke(&[json!({}), json!("Z")]), json!([]));
    }

    #[test]
    fn test_all_nodes_includes_neighbor_only_nodes() {
        let graph = json!({"A": ["B"], "B": ["C"]});
        assert_eq!(Primitive::GetAllNodes.invoke(&[graph, Value::Null]), json!(["A", "B", "C"]));
    }

    #[test]
    fn test_all_edges_deduplicates_symmetric_adjacency() {
        let edges = Primitive::GetAllEdges.invoke(&[weighted_graph()]);
        assert_eq!(edges.as_array().map(Vec::len), Some(5));
        assert_eq!(edges[0], json!(["A", "B", 4]));
    }

    #[test]
    fn test_names_round_trip() {
        for primitive in Primitive::ALL {
            assert_eq!(Primitive::from_name(primitive.name()), Some(primitive));
            assert!(primitive.js_adapter().contains(primitive.name()));
        }
        assert_eq!(Primitive::from_name("moveForward"), None);
    }

    #[test]
    fn test_decode_args_is_lenient() {
        assert_eq!(decode_args("[1, \"a\"]"), vec![json!(1), json!("a")]);
        assert!(decode_args("undefined").is_empty());
    }
}
