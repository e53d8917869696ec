// SPDX-License-Identifier: MIT

//! Graph builder - declares nodes and edges, then validates them into a [`Graph`]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::types::{
    Branch, ConditionalEdge, EdgeKind, Graph, GraphNode, Predicate, ResolvedEdge,
};
use crate::error::WorkflowError;
use crate::workflow::node::Node;

/// Collects a graph declaration
///
/// Declaration order matters: a node's position is its producer rank, which
/// fixes where its contributions land in append-policy fields.
pub struct GraphBuilder {
    name: String,
    nodes: Vec<GraphNode>,
    edges: Vec<(String, String)>,
    conditionals: Vec<ConditionalEdge>,
    entry: Option<String>,
    terminal: Option<String>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            conditionals: Vec::new(),
            entry: None,
            terminal: None,
        }
    }

    pub fn node(mut self, id: impl Into<String>, node: Arc<dyn Node>) -> Self {
        self.nodes.push(GraphNode {
            id: id.into(),
            node,
        });
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// One source, several successors that may run concurrently
    pub fn fan_out(mut self, from: &str, targets: &[&str]) -> Self {
        for target in targets {
            self.edges.push((from.to_string(), target.to_string()));
        }
        self
    }

    /// Several sources feeding a node that waits for all of them
    pub fn join(mut self, sources: &[&str], to: &str) -> Self {
        for source in sources {
            self.edges.push((source.to_string(), to.to_string()));
        }
        self
    }

    pub fn conditional(
        mut self,
        from: impl Into<String>,
        predicate: Predicate,
        then: Branch,
        otherwise: Branch,
    ) -> Self {
        self.conditionals.push(ConditionalEdge {
            from: from.into(),
            predicate,
            then,
            otherwise,
        });
        self
    }

    pub fn entry(mut self, id: impl Into<String>) -> Self {
        self.entry = Some(id.into());
        self
    }

    pub fn terminal(mut self, id: impl Into<String>) -> Self {
        self.terminal = Some(id.into());
        self
    }

    /// Validate the declaration and compute a dependency order
    pub fn build(self) -> Result<Graph, WorkflowError> {
        let mut index = HashMap::new();
        for (i, n) in self.nodes.iter().enumerate() {
            if index.insert(n.id.clone(), i).is_some() {
                return Err(WorkflowError::DuplicateNode(n.id.clone()));
            }
        }

        let lookup = |node: &str, from: &str, to: &str| {
            index
                .get(node)
                .copied()
                .ok_or_else(|| WorkflowError::UnknownNode {
                    node: node.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                })
        };

        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for (from, to) in &self.edges {
            let f = lookup(from, from, to)?;
            let t = lookup(to, from, to)?;
            // Repeated declarations of the same static edge collapse into one
            if seen.insert((f, t)) {
                edges.push(ResolvedEdge {
                    from: f,
                    to: t,
                    kind: EdgeKind::Static,
                });
            }
        }

        let mut routed = HashSet::new();
        for (ci, cond) in self.conditionals.iter().enumerate() {
            if !routed.insert(cond.from.clone()) {
                return Err(WorkflowError::DuplicateConditional(cond.from.clone()));
            }
            for branch in [&cond.then, &cond.otherwise] {
                let f = lookup(&cond.from, &cond.from, &branch.target)?;
                let t = lookup(&branch.target, &cond.from, &branch.target)?;
                edges.push(ResolvedEdge {
                    from: f,
                    to: t,
                    kind: EdgeKind::Branch {
                        conditional: ci,
                        label: branch.label.clone(),
                    },
                });
            }
        }

        let mut incoming = vec![Vec::new(); self.nodes.len()];
        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        for (ei, edge) in edges.iter().enumerate() {
            outgoing[edge.from].push(ei);
            incoming[edge.to].push(ei);
        }

        let entry = match &self.entry {
            Some(id) => {
                let idx = index
                    .get(id)
                    .copied()
                    .ok_or_else(|| WorkflowError::InvalidEntry(id.clone()))?;
                if !incoming[idx].is_empty() {
                    return Err(WorkflowError::InvalidEntry(format!(
                        "'{}' has predecessors",
                        id
                    )));
                }
                idx
            }
            None => {
                let roots: Vec<usize> = (0..self.nodes.len())
                    .filter(|&i| incoming[i].is_empty())
                    .collect();
                match roots.as_slice() {
                    [only] => *only,
                    [] => {
                        return Err(WorkflowError::InvalidEntry(
                            "graph has no root node".to_string(),
                        ))
                    }
                    _ => {
                        return Err(WorkflowError::InvalidEntry(
                            "several root nodes and no entry declared".to_string(),
                        ))
                    }
                }
            }
        };

        let terminal = match &self.terminal {
            Some(id) => {
                let idx = index
                    .get(id)
                    .copied()
                    .ok_or_else(|| WorkflowError::InvalidTerminal(id.clone()))?;
                if !outgoing[idx].is_empty() {
                    return Err(WorkflowError::InvalidTerminal(id.clone()));
                }
                Some(idx)
            }
            None => None,
        };

        let topo_order = topological_order(self.nodes.len(), &edges, &incoming)
            .map_err(|remaining| {
                WorkflowError::CircularDependency(
                    remaining
                        .into_iter()
                        .map(|i| self.nodes[i].id.clone())
                        .collect(),
                )
            })?;

        log::debug!(
            "Built graph '{}' with {} nodes and {} edges",
            self.name,
            self.nodes.len(),
            edges.len()
        );

        Ok(Graph {
            name: self.name,
            nodes: self.nodes,
            index,
            edges,
            conditionals: self.conditionals,
            incoming,
            outgoing,
            topo_order,
            entry,
            terminal,
        })
    }
}

/// Kahn's algorithm, always picking the lowest declaration index among ready nodes
///
/// On a cycle, returns the nodes that could not be ordered.
fn topological_order(
    count: usize,
    edges: &[ResolvedEdge],
    incoming: &[Vec<usize>],
) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree: Vec<usize> = incoming.iter().map(Vec::len).collect();
    let mut placed = vec![false; count];
    let mut order = Vec::with_capacity(count);

    while order.len() < count {
        let Some(next) = (0..count).find(|&i| !placed[i] && in_degree[i] == 0) else {
            return Err((0..count).filter(|&i| !placed[i]).collect());
        };
        placed[next] = true;
        order.push(next);
        for edge in edges.iter().filter(|e| e.from == next) {
            in_degree[edge.to] -= 1;
        }
    }

    Ok(order)
}
