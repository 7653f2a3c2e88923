use std::cmp::Ord;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

type Edge<N> = (N, N);
type AdjacencyMap<N> = BTreeMap<N, BTreeSet<N>>;

/// Computes an adjacency map from a set of directed edges.
///
/// A node j is included in adj[i] if there is a directed edge from i to j.
pub fn adjacency_map<N>(edges: impl Iterator<Item = Edge<N>>) -> AdjacencyMap<N>
where
    N: Eq + Copy + Ord,
{
    let mut adj = BTreeMap::new();
    for (v1, v2) in edges {
        adj.entry(v1).or_insert_with(BTreeSet::new).insert(v2);
    }
    adj
}

/// Computes the adjacency map for the transpose of a directed graph.
pub fn invert_adjacency_map<N>(adj: &AdjacencyMap<N>) -> AdjacencyMap<N>
where
    N: Eq + Copy + Ord,
{
    let mut inv = BTreeMap::new();
    for (v1, vs) in adj {
        for v2 in vs {
            inv.entry(*v2).or_insert_with(BTreeSet::new).insert(*v1);
        }
    }
    inv
}

/// Computes a topological sort of the given nodes.
///
/// Returns `None` if the graph contains a cycle.
pub fn topological_sort<N>(nodes: &[N], adj: &AdjacencyMap<N>) -> Option<Vec<N>>
where
    N: Eq + Copy + Ord,
{
    let mut in_degree: BTreeMap<N, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    for ns in adj.values() {
        for n2 in ns {
            *in_degree.entry(*n2).or_insert(0) += 1;
        }
    }
    let mut pending: VecDeque<N> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut results: Vec<N> = Vec::with_capacity(in_degree.len());
    let empty = BTreeSet::new();
    while let Some(n) = pending.pop_front() {
        results.push(n);
        for n2 in adj.get(&n).unwrap_or(&empty) {
            if let Some(deg) = in_degree.get_mut(n2) {
                if *deg == 1 {
                    pending.push_front(*n2);
                }
                *deg -= 1;
            }
        }
    }
    if results.len() == in_degree.len() {
        Some(results)
    } else {
        None
    }
}

/// Computes the set of nodes from which `target` can be reached, including `target` itself.
pub fn ancestors<N>(target: N, adj: &AdjacencyMap<N>) -> BTreeSet<N>
where
    N: Eq + Copy + Ord,
{
    let inv = invert_adjacency_map(adj);
    let mut seen = BTreeSet::new();
    let mut pending = vec![target];
    while let Some(n) = pending.pop() {
        if seen.insert(n) {
            if let Some(preds) = inv.get(&n) {
                pending.extend(preds.iter().copied());
            }
        }
    }
    seen
}
