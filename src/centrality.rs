//! Vertex centrality over the per-request dependency graph.
//!
//! All measures operate on the undirected, weighted view of the graph and
//! return one score per node, in node-index order. The dependency graphs
//! these run on are small (one node per candidate sense), so the
//! implementations favor clarity over asymptotic tuning.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::pool::DependencyGraph;
use crate::pqueue::IndexedMinQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CentralityKind {
    /// Sum of incident edge weights, in and out.
    Degree,
    /// Weighted PageRank, damping 0.85.
    Pagerank,
    /// Inverse of the mean shortest-path distance to reachable nodes.
    Closeness,
    /// Weighted Brandes betweenness.
    Betweenness,
    /// Power iteration on the weighted adjacency matrix.
    Eigenvector,
}

impl std::fmt::Display for CentralityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CentralityKind::Degree => "degree",
            CentralityKind::Pagerank => "pagerank",
            CentralityKind::Closeness => "closeness",
            CentralityKind::Betweenness => "betweenness",
            CentralityKind::Eigenvector => "eigenvector",
        };
        write!(f, "{name}")
    }
}

/// One centrality score per node of `graph`, in node-index order.
pub fn scores(graph: &DependencyGraph, kind: CentralityKind) -> Vec<f64> {
    let adj = undirected_adjacency(graph);
    match kind {
        CentralityKind::Degree => degree(&adj),
        CentralityKind::Pagerank => pagerank(&adj),
        CentralityKind::Closeness => closeness(&adj),
        CentralityKind::Betweenness => betweenness(&adj),
        CentralityKind::Eigenvector => eigenvector(&adj),
    }
}

/// Symmetric adjacency: for every edge, both endpoints list the other.
fn undirected_adjacency(graph: &DependencyGraph) -> Vec<Vec<(u32, f64)>> {
    let mut adj = vec![Vec::new(); graph.node_count()];
    for eid in graph.edge_indices() {
        let (a, b) = graph.edge_endpoints(eid).expect("edge without endpoints");
        let w = graph[eid];
        adj[a.index()].push((b.index() as u32, w));
        adj[b.index()].push((a.index() as u32, w));
    }
    adj
}

fn degree(adj: &[Vec<(u32, f64)>]) -> Vec<f64> {
    adj.iter().map(|nbrs| nbrs.iter().map(|&(_, w)| w).sum()).collect()
}

fn pagerank(adj: &[Vec<(u32, f64)>]) -> Vec<f64> {
    const DAMPING: f64 = 0.85;
    const MAX_ITER: usize = 100;
    const EPSILON: f64 = 1e-10;

    let n = adj.len();
    if n == 0 {
        return Vec::new();
    }
    let weight_sum: Vec<f64> = adj
        .iter()
        .map(|nbrs| nbrs.iter().map(|&(_, w)| w).sum::<f64>())
        .collect();

    let mut rank = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];
    for _ in 0..MAX_ITER {
        let base = (1.0 - DAMPING) / n as f64;
        // Dangling mass is redistributed uniformly.
        let dangling: f64 = (0..n).filter(|&v| weight_sum[v] == 0.0).map(|v| rank[v]).sum();
        next.iter_mut().for_each(|x| *x = base + DAMPING * dangling / n as f64);
        for v in 0..n {
            if weight_sum[v] == 0.0 {
                continue;
            }
            let share = DAMPING * rank[v] / weight_sum[v];
            for &(u, w) in &adj[v] {
                next[u as usize] += share * w;
            }
        }
        let delta: f64 = rank.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut rank, &mut next);
        if delta < EPSILON {
            break;
        }
    }
    rank
}

/// Single-source shortest-path distances over the symmetric adjacency.
fn sssp(adj: &[Vec<(u32, f64)>], source: usize, dist: &mut [f64], order: &mut Vec<u32>) {
    dist.fill(f64::INFINITY);
    order.clear();
    dist[source] = 0.0;
    let mut queue = IndexedMinQueue::with_positions(adj.len());
    queue.insert(source as u32, dist);
    while let Some(u) = queue.pop_min(dist) {
        if dist[u as usize].is_infinite() {
            break;
        }
        order.push(u);
        for &(v, w) in &adj[u as usize] {
            let alt = dist[u as usize] + w;
            if alt < dist[v as usize] {
                let fresh = dist[v as usize].is_infinite();
                dist[v as usize] = alt;
                if fresh {
                    queue.insert(v, dist);
                } else {
                    queue.decrease_key(v, dist);
                }
            }
        }
    }
}

fn closeness(adj: &[Vec<(u32, f64)>]) -> Vec<f64> {
    let n = adj.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut order = Vec::new();
    (0..n)
        .map(|v| {
            sssp(adj, v, &mut dist, &mut order);
            let mut sum = 0.0;
            let mut reachable = 0usize;
            for &u in &order {
                if u as usize != v {
                    sum += dist[u as usize];
                    reachable += 1;
                }
            }
            if reachable == 0 || sum == 0.0 {
                0.0
            } else {
                reachable as f64 / sum
            }
        })
        .collect()
}

fn betweenness(adj: &[Vec<(u32, f64)>]) -> Vec<f64> {
    let n = adj.len();
    let mut scores = vec![0.0; n];
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0f64; n];
    let mut delta = vec![0.0f64; n];
    let mut preds: Vec<Vec<u32>> = vec![Vec::new(); n];
    let mut order: Vec<u32> = Vec::new();

    for s in 0..n {
        dist.fill(f64::INFINITY);
        sigma.fill(0.0);
        delta.fill(0.0);
        preds.iter_mut().for_each(Vec::clear);
        order.clear();

        dist[s] = 0.0;
        sigma[s] = 1.0;
        let mut queue = IndexedMinQueue::with_positions(n);
        queue.insert(s as u32, &dist);
        while let Some(u) = queue.pop_min(&dist) {
            if dist[u as usize].is_infinite() {
                break;
            }
            order.push(u);
            for &(v, w) in &adj[u as usize] {
                let alt = dist[u as usize] + w;
                if alt < dist[v as usize] {
                    let fresh = dist[v as usize].is_infinite();
                    dist[v as usize] = alt;
                    if fresh {
                        queue.insert(v, &dist);
                    } else {
                        queue.decrease_key(v, &dist);
                    }
                    sigma[v as usize] = sigma[u as usize];
                    preds[v as usize].clear();
                    preds[v as usize].push(u);
                } else if alt == dist[v as usize] && v as usize != s {
                    sigma[v as usize] += sigma[u as usize];
                    preds[v as usize].push(u);
                }
            }
        }

        // Dependency accumulation in reverse settling order.
        for &v in order.iter().rev() {
            for &u in &preds[v as usize] {
                delta[u as usize] +=
                    sigma[u as usize] / sigma[v as usize] * (1.0 + delta[v as usize]);
            }
            if v as usize != s {
                scores[v as usize] += delta[v as usize];
            }
        }
    }
    // Each undirected pair was counted from both endpoints.
    scores.iter_mut().for_each(|x| *x /= 2.0);
    scores
}

fn eigenvector(adj: &[Vec<(u32, f64)>]) -> Vec<f64> {
    const MAX_ITER: usize = 100;
    const EPSILON: f64 = 1e-10;

    let n = adj.len();
    if n == 0 {
        return Vec::new();
    }
    let mut x = vec![1.0; n];
    let mut next = vec![0.0; n];
    for _ in 0..MAX_ITER {
        next.fill(0.0);
        for v in 0..n {
            for &(u, w) in &adj[v] {
                next[u as usize] += w * x[v];
            }
        }
        let norm = next.iter().fold(0.0f64, |m, &v| m.max(v.abs()));
        if norm == 0.0 {
            // No edges: centrality is uniform.
            return vec![0.0; n];
        }
        next.iter_mut().for_each(|v| *v /= norm);
        let delta: f64 = x.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut x, &mut next);
        if delta < EPSILON {
            break;
        }
    }
    x
}
