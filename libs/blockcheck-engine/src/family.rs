/// Family Dispatch Table
///
/// Every per-family decision the pipeline makes (which rewrites apply, which
/// identifiers are shared state, how parameters are recovered, whether a
/// primary run may be reused) is read from one `FamilyProfile`. Adding a new
/// family means adding an `AlgorithmFamily` variant and a profile; the match
/// in `profile` keeps that exhaustive.

use blockcheck_common::types::{AlgorithmFamily, LevelMetadata};
use serde_json::Value;

/// Source rewrites the patcher may apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchRule {
    SelfReferenceRepair,
    Relocalize,
    MissingReturn,
    DuplicateReturn,
}

/// How a parameter with no supplied value is filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derive {
    Zero,
    /// Length of the array bound to another slot
    LengthOf(&'static str),
    EmptyArray,
    EmptyObject,
    /// N x N grid of zeros, N from the `n` slot
    EmptyBoard,
    GraphMap,
    NodeList,
    EdgeList,
}

/// Parameter names that all mean the same input slot
#[derive(Debug, Clone, Copy)]
pub struct AliasGroup {
    pub slot: &'static str,
    /// Lowercase spellings
    pub names: &'static [&'static str],
    pub derive: Option<Derive>,
}

impl AliasGroup {
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.names.iter().any(|n| *n == lower)
    }
}

pub struct FamilyProfile {
    pub family: AlgorithmFamily,
    pub patches: &'static [PatchRule],
    /// Variables a base case conventionally stores its answer in
    pub result_variables: &'static [&'static str],
    /// Outer-scope identifiers that are meant to be shared across frames
    pub shared_identifiers: &'static [&'static str],
    pub aliases: &'static [AliasGroup],
    /// Whether the primary case may reuse the value from the full run
    pub reuse_primary_result: bool,
    /// Whether a `true` return only signals success and the answer lives elsewhere
    pub boolean_is_success_flag: bool,
    pub level_data: fn(&LevelMetadata) -> Option<&Value>,
}

impl FamilyProfile {
    pub fn applies(&self, rule: PatchRule) -> bool {
        self.patches.contains(&rule)
    }

    pub fn is_shared(&self, identifier: &str) -> bool {
        self.shared_identifiers.contains(&identifier)
            || self.aliases.iter().any(|group| group.matches(identifier) && group.derive.is_none())
    }

    pub fn is_result_variable(&self, identifier: &str) -> bool {
        self.result_variables.contains(&identifier)
    }

    pub fn alias_for(&self, param: &str) -> Option<&'static AliasGroup> {
        self.aliases.iter().find(|group| group.matches(param))
    }
}

const RECURSIVE_RULES: &[PatchRule] = &[
    PatchRule::Relocalize,
    PatchRule::MissingReturn,
    PatchRule::DuplicateReturn,
];

const INDEX: AliasGroup = AliasGroup {
    slot: "index",
    names: &["i", "index", "idx", "item", "currentindex", "pos", "position"],
    derive: Some(Derive::Zero),
};

const MEMO: AliasGroup = AliasGroup {
    slot: "memo",
    names: &["memo", "dp", "cache", "table", "memotable"],
    derive: Some(Derive::EmptyObject),
};

static GRAPH: FamilyProfile = FamilyProfile {
    family: AlgorithmFamily::Graph,
    patches: &[PatchRule::Relocalize, PatchRule::DuplicateReturn],
    result_variables: &["result", "path", "dist", "distances", "mst", "order", "answer"],
    shared_identifiers: &[
        "graph", "visited", "dist", "distances", "parent", "prev", "previous", "queue", "stack",
        "order", "path", "result", "mst", "edges", "nodes", "allNodes", "rank", "solution",
    ],
    aliases: &[
        AliasGroup {
            slot: "graph",
            names: &["graph", "g", "adj", "adjacency", "adjacencylist", "graphmap", "map"],
            derive: Some(Derive::GraphMap),
        },
        AliasGroup {
            slot: "start",
            names: &["start", "startnode", "source", "src", "from", "s", "begin", "origin", "startvertex"],
            derive: None,
        },
        AliasGroup {
            slot: "end",
            names: &["end", "endnode", "goal", "target", "to", "dest", "destination", "finish", "goalnode"],
            derive: None,
        },
        AliasGroup {
            slot: "nodes",
            names: &["nodes", "allnodes", "vertices", "nodelist", "vertexlist"],
            derive: Some(Derive::NodeList),
        },
        AliasGroup {
            slot: "edges",
            names: &["edges", "edgelist", "alledges"],
            derive: Some(Derive::EdgeList),
        },
        AliasGroup {
            slot: "visited",
            names: &["visited", "seen", "path", "currentpath"],
            derive: Some(Derive::EmptyArray),
        },
    ],
    reuse_primary_result: true,
    boolean_is_success_flag: false,
    level_data: graph_data,
};

static KNAPSACK: FamilyProfile = FamilyProfile {
    family: AlgorithmFamily::Knapsack,
    patches: RECURSIVE_RULES,
    result_variables: &["result", "best", "maxValue", "answer", "res"],
    shared_identifiers: &["memo", "dp", "cache", "table", "weights", "values", "capacity", "n"],
    aliases: &[
        AliasGroup {
            slot: "weights",
            names: &["weights", "weight", "wt", "wts", "itemweights"],
            derive: None,
        },
        AliasGroup {
            slot: "values",
            names: &["values", "value", "val", "vals", "profits", "profit", "itemvalues"],
            derive: None,
        },
        AliasGroup {
            slot: "capacity",
            names: &["capacity", "cap", "maxweight", "limit", "knapsackcapacity", "weightlimit", "w"],
            derive: None,
        },
        AliasGroup {
            slot: "n",
            names: &["n", "count", "numitems", "itemcount", "size"],
            derive: Some(Derive::LengthOf("weights")),
        },
        INDEX,
        MEMO,
    ],
    reuse_primary_result: true,
    boolean_is_success_flag: false,
    level_data: knapsack_data,
};

static SUBSET_SUM: FamilyProfile = FamilyProfile {
    family: AlgorithmFamily::SubsetSum,
    patches: RECURSIVE_RULES,
    result_variables: &["result", "found", "answer", "res"],
    shared_identifiers: &["memo", "dp", "cache", "arr", "numbers", "nums", "target", "n", "subset"],
    aliases: &[
        AliasGroup {
            slot: "numbers",
            names: &["arr", "array", "set", "nums", "numbers", "values", "items", "list", "elements"],
            derive: None,
        },
        AliasGroup {
            slot: "target",
            names: &["target", "sum", "targetsum", "goal", "total", "k"],
            derive: None,
        },
        AliasGroup {
            slot: "n",
            names: &["n", "count", "size", "length"],
            derive: Some(Derive::LengthOf("numbers")),
        },
        AliasGroup {
            slot: "subset",
            names: &["subset", "current", "chosen", "selected"],
            derive: Some(Derive::EmptyArray),
        },
        INDEX,
        MEMO,
    ],
    reuse_primary_result: true,
    boolean_is_success_flag: false,
    level_data: subset_sum_data,
};

static COIN_CHANGE: FamilyProfile = FamilyProfile {
    family: AlgorithmFamily::CoinChange,
    patches: RECURSIVE_RULES,
    result_variables: &["result", "minCoins", "best", "answer", "res", "ways"],
    shared_identifiers: &["memo", "dp", "cache", "coins", "amount", "n"],
    aliases: &[
        AliasGroup {
            slot: "coins",
            names: &["coins", "denominations", "coinlist", "coinvalues"],
            derive: None,
        },
        AliasGroup {
            slot: "amount",
            names: &["amount", "target", "total", "sum", "money", "change", "value"],
            derive: None,
        },
        AliasGroup {
            slot: "n",
            names: &["n", "count", "size"],
            derive: Some(Derive::LengthOf("coins")),
        },
        INDEX,
        MEMO,
    ],
    reuse_primary_result: true,
    boolean_is_success_flag: false,
    level_data: coin_change_data,
};

static N_QUEENS: FamilyProfile = FamilyProfile {
    family: AlgorithmFamily::NQueens,
    patches: &[
        PatchRule::SelfReferenceRepair,
        PatchRule::Relocalize,
        PatchRule::MissingReturn,
        PatchRule::DuplicateReturn,
    ],
    result_variables: &["result", "solution", "solutions", "answer"],
    shared_identifiers: &["board", "solution", "solutions", "result", "count", "n", "N"],
    aliases: &[
        AliasGroup {
            slot: "n",
            names: &["n", "size", "boardsize", "queens", "numqueens", "dimension"],
            derive: None,
        },
        AliasGroup {
            slot: "row",
            names: &["row", "r", "startrow", "currentrow"],
            derive: Some(Derive::Zero),
        },
        AliasGroup {
            slot: "col",
            names: &["col", "c", "column", "startcol"],
            derive: Some(Derive::Zero),
        },
        AliasGroup {
            slot: "board",
            names: &["board", "grid", "chessboard"],
            derive: Some(Derive::EmptyBoard),
        },
    ],
    // The animated run mutates the shared board, so it is never trusted
    reuse_primary_result: false,
    boolean_is_success_flag: true,
    level_data: nqueen_data,
};

static ROPE_PARTITION: FamilyProfile = FamilyProfile {
    family: AlgorithmFamily::RopePartition,
    patches: RECURSIVE_RULES,
    result_variables: &["result", "best", "maxPieces", "answer", "res"],
    shared_identifiers: &["memo", "dp", "cache", "cuts", "lengths", "a", "b", "c"],
    aliases: &[
        AliasGroup {
            slot: "length",
            names: &["n", "length", "ropelength", "rope", "total", "len", "remaining"],
            derive: None,
        },
        AliasGroup {
            slot: "a",
            names: &["a", "cut1", "piece1", "x"],
            derive: None,
        },
        AliasGroup {
            slot: "b",
            names: &["b", "cut2", "piece2", "y"],
            derive: None,
        },
        AliasGroup {
            slot: "c",
            names: &["c", "cut3", "piece3", "z"],
            derive: None,
        },
        AliasGroup {
            slot: "cuts",
            names: &["cuts", "lengths", "pieces", "segments", "options", "sizes"],
            derive: None,
        },
        INDEX,
        MEMO,
    ],
    reuse_primary_result: true,
    boolean_is_success_flag: false,
    level_data: rope_partition_data,
};

static GENERIC: FamilyProfile = FamilyProfile {
    family: AlgorithmFamily::Generic,
    patches: &[PatchRule::Relocalize, PatchRule::DuplicateReturn],
    result_variables: &["result", "answer"],
    shared_identifiers: &["result", "memo"],
    aliases: &[],
    reuse_primary_result: true,
    boolean_is_success_flag: false,
    level_data: graph_data,
};

fn graph_data(level: &LevelMetadata) -> Option<&Value> {
    level.graph_data.as_ref()
}

fn knapsack_data(level: &LevelMetadata) -> Option<&Value> {
    level.knapsack_data.as_ref()
}

fn subset_sum_data(level: &LevelMetadata) -> Option<&Value> {
    level.subset_sum_data.as_ref()
}

fn coin_change_data(level: &LevelMetadata) -> Option<&Value> {
    level.coin_change_data.as_ref()
}

fn nqueen_data(level: &LevelMetadata) -> Option<&Value> {
    level.nqueen_data.as_ref()
}

fn rope_partition_data(level: &LevelMetadata) -> Option<&Value> {
    level.rope_partition_data.as_ref()
}

pub fn profile(family: AlgorithmFamily) -> &'static FamilyProfile {
    match family {
        AlgorithmFamily::CoinChange => &COIN_CHANGE,
        AlgorithmFamily::SubsetSum => &SUBSET_SUM,
        AlgorithmFamily::Knapsack => &KNAPSACK,
        AlgorithmFamily::NQueens => &N_QUEENS,
        AlgorithmFamily::RopePartition => &ROPE_PARTITION,
        AlgorithmFamily::Graph => &GRAPH,
        AlgorithmFamily::Generic => &GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_family_has_matching_profile() {
        for family in AlgorithmFamily::ALL {
            assert_eq!(profile(family).family, family);
        }
    }

    #[test]
    fn test_alias_lookup_is_case_insensitive() {
        let knapsack = profile(AlgorithmFamily::Knapsack);
        assert_eq!(knapsack.alias_for("Capacity").map(|g| g.slot), Some("capacity"));
        assert_eq!(knapsack.alias_for("wt").map(|g| g.slot), Some("weights"));
        assert!(knapsack.alias_for("banana").is_none());
    }

    #[test]
    fn test_shared_identifiers_include_data_slots() {
        let graph = profile(AlgorithmFamily::Graph);
        assert!(graph.is_shared("visited"));
        assert!(graph.is_shared("start"));
        assert!(!graph.is_shared("i"));

        let queens = profile(AlgorithmFamily::NQueens);
        assert!(queens.is_shared("board"));
        assert!(!queens.is_shared("col"));
    }

    #[test]
    fn test_only_n_queens_repairs_self_references() {
        for family in AlgorithmFamily::ALL {
            let repairs = profile(family).applies(PatchRule::SelfReferenceRepair);
            assert_eq!(repairs, family == AlgorithmFamily::NQueens);
        }
    }
}
