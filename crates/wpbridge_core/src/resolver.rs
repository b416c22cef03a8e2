//! Orders enqueued assets so that every dependency loads before its dependents.
//!
//! This is a stable variant of Kahn's algorithm: the FIFO queue keeps independent
//! siblings in their original relative order, so the output is deterministic and
//! resolving an already resolved list is a no-op.
use std::collections::HashMap;
use std::collections::VecDeque;

use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use thiserror::Error;

use crate::types::AssetDescriptor;

/// Raised when the dependency graph contains a cycle
///
/// The cyclic handles are still returned, appended in their original order, but their
/// relative ordering is not guaranteed to satisfy their dependencies.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(
  "Circular dependency detected between assets: expected {expected} ordered handles, got {actual} ({handles:?})"
)]
pub struct CycleWarning {
  pub expected: usize,
  pub actual: usize,
  pub handles: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedOrder {
  pub assets: Vec<AssetDescriptor>,
  pub cycle: Option<CycleWarning>,
}

/// Returns the descriptors in dependency order
pub fn resolve(descriptors: &[AssetDescriptor]) -> Vec<AssetDescriptor> {
  resolve_with_report(descriptors).assets
}

#[tracing::instrument(level = "debug", skip_all, fields(count = descriptors.len()))]
pub fn resolve_with_report(descriptors: &[AssetDescriptor]) -> ResolvedOrder {
  // Node weights are indices into `descriptors`, nodes are added in input order
  let mut graph: DiGraph<usize, ()> = DiGraph::new();
  let mut node_by_handle: HashMap<&str, NodeIndex> = HashMap::new();
  let mut duplicates = Vec::new();
  let mut anonymous = Vec::new();

  for (index, descriptor) in descriptors.iter().enumerate() {
    match descriptor.handle.as_deref().filter(|h| !h.is_empty()) {
      Some(handle) if node_by_handle.contains_key(handle) => {
        tracing::warn!(handle, "Duplicate asset handle, keeping enqueue order");
        duplicates.push(index);
      }
      Some(handle) => {
        let node = graph.add_node(index);
        node_by_handle.insert(handle, node);
      }
      None => anonymous.push(index),
    }
  }

  let nodes = graph.node_indices().collect::<Vec<_>>();
  for &node in &nodes {
    let descriptor = &descriptors[graph[node]];
    for dependency in &descriptor.dependencies {
      if let Some(&dependency_node) = node_by_handle.get(dependency.as_str()) {
        graph.add_edge(dependency_node, node, ());
      }
    }
  }

  let mut in_degree = nodes
    .iter()
    .map(|node| {
      graph
        .neighbors_directed(*node, Direction::Incoming)
        .count()
    })
    .collect::<Vec<_>>();

  let mut queue = nodes
    .iter()
    .copied()
    .filter(|node| in_degree[node.index()] == 0)
    .collect::<VecDeque<_>>();

  let mut ordered = Vec::with_capacity(nodes.len());
  let mut placed = vec![false; nodes.len()];

  while let Some(node) = queue.pop_front() {
    ordered.push(node);
    placed[node.index()] = true;

    // petgraph walks edges newest first, dependents must be released in input order
    let mut dependents = graph
      .neighbors_directed(node, Direction::Outgoing)
      .collect::<Vec<_>>();
    dependents.sort();

    for dependent in dependents {
      let degree = &mut in_degree[dependent.index()];
      *degree -= 1;
      if *degree == 0 {
        queue.push_back(dependent);
      }
    }
  }

  let mut cycle = None;
  if ordered.len() < nodes.len() {
    let remaining = nodes
      .iter()
      .copied()
      .filter(|node| !placed[node.index()])
      .collect::<Vec<_>>();

    let warning = CycleWarning {
      expected: nodes.len(),
      actual: ordered.len(),
      handles: remaining
        .iter()
        .map(|node| descriptors[graph[*node]].to_string())
        .collect(),
    };
    tracing::warn!(
      expected = warning.expected,
      actual = warning.actual,
      handles = ?warning.handles,
      "Circular dependency detected, appending cyclic assets in enqueue order"
    );

    ordered.extend(remaining);
    cycle = Some(warning);
  }

  let assets = ordered
    .into_iter()
    .map(|node| graph[node])
    .chain(duplicates)
    .chain(anonymous)
    .map(|index| descriptors[index].clone())
    .collect();

  ResolvedOrder { assets, cycle }
}
