//! Blended centrality ranking.
//!
//! Builds an explicit in-memory directed graph for one tenant and computes
//! three measures — degree centrality, Brandes betweenness, and a
//! power-iteration PageRank — each independently normalized to [0, 1],
//! then blended with configurable weights (0.4/0.3/0.3 by default).
//!
//! Ties are broken by node insertion order, so a fixed graph always ranks
//! identically.

use std::collections::HashMap;

use crate::config::CentralityConfig;
use crate::types::{GraphEdge, GraphNode};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Blended centrality score for one node.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedNode {
    pub node_id: String,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Internal: in-memory graph representation
// ---------------------------------------------------------------------------

/// Adjacency structure keyed by integer index. The index into `node_ids`
/// is the node's position everywhere else.
struct LoadedGraph {
    node_ids: Vec<String>,
    out_links: Vec<Vec<usize>>,
    in_links: Vec<Vec<usize>>,
}

impl LoadedGraph {
    fn build(nodes: &[GraphNode], edges: &[GraphEdge]) -> Self {
        let node_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let index: HashMap<&str, usize> = node_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let n = node_ids.len();
        let mut out_links = vec![Vec::new(); n];
        let mut in_links = vec![Vec::new(); n];
        for edge in edges {
            // Dangling endpoints have no node row yet and contribute
            // nothing to centrality until the target is indexed.
            if let (Some(&s), Some(&t)) = (
                index.get(edge.source_id.as_str()),
                index.get(edge.target_id.as_str()),
            ) {
                out_links[s].push(t);
                in_links[t].push(s);
            }
        }

        Self {
            node_ids,
            out_links,
            in_links,
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Rank all nodes by blended centrality, descending.
pub fn rank(nodes: &[GraphNode], edges: &[GraphEdge], config: &CentralityConfig) -> Vec<RankedNode> {
    let graph = LoadedGraph::build(nodes, edges);
    let n = graph.node_ids.len();
    if n == 0 {
        return Vec::new();
    }

    let degree = normalize(degree_centrality(&graph));
    let betweenness = normalize(betweenness_centrality(&graph));
    let pagerank = normalize(page_rank(
        &graph,
        config.pagerank_damping,
        config.pagerank_iterations,
    ));

    let mut ranked: Vec<(usize, RankedNode)> = graph
        .node_ids
        .into_iter()
        .enumerate()
        .map(|(i, node_id)| {
            let score = config.degree_weight * degree[i]
                + config.betweenness_weight * betweenness[i]
                + config.pagerank_weight * pagerank[i];
            (i, RankedNode { node_id, score })
        })
        .collect();

    ranked.sort_by(|(ia, a), (ib, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ia.cmp(ib))
    });
    ranked.into_iter().map(|(_, r)| r).collect()
}

// ---------------------------------------------------------------------------
// Measures
// ---------------------------------------------------------------------------

/// Fraction of other nodes each node touches (in + out), the directed
/// analogue of degree centrality.
fn degree_centrality(graph: &LoadedGraph) -> Vec<f64> {
    let n = graph.node_ids.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| (graph.out_links[i].len() + graph.in_links[i].len()) as f64 / denom)
        .collect()
}

/// Brandes' algorithm for betweenness centrality on an unweighted
/// directed graph.
fn betweenness_centrality(graph: &LoadedGraph) -> Vec<f64> {
    let n = graph.node_ids.len();
    let mut centrality = vec![0.0f64; n];

    for s in 0..n {
        // BFS from s, accumulating shortest-path counts.
        let mut stack: Vec<usize> = Vec::new();
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist = vec![-1i64; n];
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &graph.out_links[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        // Back-propagate dependencies.
        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    // Scale by the number of ordered pairs, as for directed graphs.
    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for value in centrality.iter_mut() {
            *value *= scale;
        }
    }
    centrality
}

/// Power-iteration PageRank with uniform teleportation; a dangling node
/// distributes its mass evenly.
fn page_rank(graph: &LoadedGraph, damping: f64, iterations: usize) -> Vec<f64> {
    let n = graph.node_ids.len();
    if n == 0 {
        return Vec::new();
    }

    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0f64; n];
    let base = (1.0 - damping) / n as f64;

    for _ in 0..iterations {
        for value in next.iter_mut() {
            *value = base;
        }
        for i in 0..n {
            let targets = &graph.out_links[i];
            if targets.is_empty() {
                let share = (damping * scores[i]) / n as f64;
                for value in next.iter_mut() {
                    *value += share;
                }
            } else {
                let share = (damping * scores[i]) / targets.len() as f64;
                for &t in targets {
                    next[t] += share;
                }
            }
        }
        std::mem::swap(&mut scores, &mut next);
    }

    scores
}

/// Scale a measure so its maximum is 1.0; an all-zero measure stays zero.
fn normalize(mut values: Vec<f64>) -> Vec<f64> {
    let max = values.iter().cloned().fold(0.0f64, f64::max);
    if max > 0.0 {
        for value in values.iter_mut() {
            *value /= max;
        }
    }
    values
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
