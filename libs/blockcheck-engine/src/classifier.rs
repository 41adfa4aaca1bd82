/// Algorithm Classifier
///
/// Level data is authoritative; identifiers in the code are the fallback.
/// Identifiers may carry the numeric suffix the block compiler appends to
/// disambiguate (`solve2`, `knapsack3`). Strings and comments are ignored.

use blockcheck_common::types::{AlgorithmFamily, LevelMetadata};
use lazy_static::lazy_static;
use regex::Regex;

use crate::scan::mask_non_code;

lazy_static! {
    static ref COIN_CHANGE: Regex =
        Regex::new(r"(?i)\b(?:coinChange|minCoins|countCoins|makeChange)\d*\b").unwrap();
    static ref SUBSET_SUM: Regex =
        Regex::new(r"(?i)\b(?:subsetSum|hasSubsetSum|isSubsetSum)\d*\b").unwrap();
    static ref KNAPSACK: Regex =
        Regex::new(r"(?i)\b(?:knapsack|zeroOneKnapsack)\d*\b").unwrap();
    static ref N_QUEENS: Regex =
        Regex::new(r"(?i)\b(?:nQueens?|solveNQueens?|placeQueens?|isSafe)\d*\b").unwrap();
    static ref ROPE_PARTITION: Regex =
        Regex::new(r"(?i)\b(?:ropePartition|cutRope|partitionRope|maxRopePieces|ropeCutting)\d*\b")
            .unwrap();
    static ref GRAPH: Regex = Regex::new(
        r"(?i)\b(?:bfs|dfs|dijkstra|prim|kruskal|shortestPath|findPath|breadthFirstSearch|depthFirstSearch|minimumSpanningTree)\d*\b"
    )
    .unwrap();
}

/// Independent detection results; `family()` resolves them by priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilyFlags {
    pub coin_change: bool,
    pub subset_sum: bool,
    pub knapsack: bool,
    pub n_queens: bool,
    pub rope_partition: bool,
    pub graph: bool,
}

impl FamilyFlags {
    /// coin-change > subset-sum > knapsack > N-Queens > rope-partition > graph > generic
    pub fn family(&self) -> AlgorithmFamily {
        if self.coin_change {
            AlgorithmFamily::CoinChange
        } else if self.subset_sum {
            AlgorithmFamily::SubsetSum
        } else if self.knapsack {
            AlgorithmFamily::Knapsack
        } else if self.n_queens {
            AlgorithmFamily::NQueens
        } else if self.rope_partition {
            AlgorithmFamily::RopePartition
        } else if self.graph {
            AlgorithmFamily::Graph
        } else {
            AlgorithmFamily::Generic
        }
    }
}

pub fn classify(source: &str, level: &LevelMetadata) -> FamilyFlags {
    let code = mask_non_code(source);
    let has_nqueen_data = level.nqueen_data.is_some();

    FamilyFlags {
        coin_change: level.coin_change_data.is_some() || COIN_CHANGE.is_match(&code),
        subset_sum: level.subset_sum_data.is_some() || SUBSET_SUM.is_match(&code),
        knapsack: level.knapsack_data.is_some() || KNAPSACK.is_match(&code),
        // A bare `solve` only counts when the level is an N-Queens level
        n_queens: has_nqueen_data || N_QUEENS.is_match(&code),
        rope_partition: level.rope_partition_data.is_some() || ROPE_PARTITION.is_match(&code),
        graph: level.graph_data.is_some() || GRAPH.is_match(&code),
    }
}

/// Shorthand for `classify(..).family()`
pub fn classify_family(source: &str, level: &LevelMetadata) -> AlgorithmFamily {
    classify(source, level).family()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lexical_detection_with_suffix() {
        let flags = classify("async function knapsack2(w, v, c) { }", &LevelMetadata::default());
        assert!(flags.knapsack);
        assert_eq!(flags.family(), AlgorithmFamily::Knapsack);
    }

    #[test]
    fn test_priority_order() {
        let src = "function coinChange(c, a) {} function dijkstra(g) {} function knapsack() {}";
        assert_eq!(classify_family(src, &LevelMetadata::default()), AlgorithmFamily::CoinChange);

        let src = "function nQueens(n) {} function ropePartition(n) {}";
        assert_eq!(classify_family(src, &LevelMetadata::default()), AlgorithmFamily::NQueens);
    }

    #[test]
    fn test_level_data_is_authoritative() {
        let level = LevelMetadata {
            subset_sum_data: Some(json!({"numbers": [3, 4], "target": 7})),
            ..Default::default()
        };
        assert_eq!(classify_family("function bfs(g) {}", &level), AlgorithmFamily::SubsetSum);
    }

    #[test]
    fn test_bare_solve_requires_nqueen_data() {
        let src = "async function solve(row) { return true; }";
        let flags = classify(src, &LevelMetadata::default());
        assert!(!flags.n_queens);
        assert_eq!(flags.family(), AlgorithmFamily::Generic);

        let level = LevelMetadata {
            nqueen_data: Some(json!({"n": 4})),
            ..Default::default()
        };
        assert_eq!(classify_family(src, &level), AlgorithmFamily::NQueens);
    }

    #[test]
    fn test_identifiers_in_strings_are_ignored() {
        let src = "function run() { say('try dijkstra next'); // knapsack\n }";
        assert_eq!(classify_family(src, &LevelMetadata::default()), AlgorithmFamily::Generic);
    }

    #[test]
    fn test_graph_detection_does_not_match_prefixes() {
        let src = "function primary() {} function dfsLike() {}";
        assert_eq!(classify_family(src, &LevelMetadata::default()), AlgorithmFamily::Generic);
        assert_eq!(
            classify_family("async function Dijkstra(graph, s) {}", &LevelMetadata::default()),
            AlgorithmFamily::Graph
        );
    }
}
