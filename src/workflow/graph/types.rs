// SPDX-License-Identifier: MIT

//! Graph type definitions
//!
//! A [`Graph`] is an immutable value produced by
//! [`GraphBuilder`](super::builder::GraphBuilder); the scheduler only reads it,
//! so the same graph can serve any number of runs.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::workflow::node::Node;
use crate::workflow::state::WorkState;

/// Predicate evaluated on the merged state right after the source node completes
pub type Predicate = fn(&WorkState) -> bool;

/// A declared node
#[derive(Clone)]
pub struct GraphNode {
    pub id: String,
    pub node: Arc<dyn Node>,
}

/// One successor of a conditional edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    /// Route name used in logs and events
    pub label: String,
    pub target: String,
}

impl Branch {
    pub fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
        }
    }
}

/// Two-way routing decision leaving a node
#[derive(Clone)]
pub struct ConditionalEdge {
    pub from: String,
    pub predicate: Predicate,
    /// Taken when the predicate holds
    pub then: Branch,
    /// Taken otherwise
    pub otherwise: Branch,
}

impl ConditionalEdge {
    /// Pick exactly one branch for the given state
    pub fn select(&self, state: &WorkState) -> &Branch {
        if (self.predicate)(state) {
            &self.then
        } else {
            &self.otherwise
        }
    }
}

/// How an edge is decided at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeKind {
    /// Taken as soon as the source completes
    Static,
    /// One branch of the conditional edge at the given index
    Branch { conditional: usize, label: String },
}

/// An edge between two node indices
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEdge {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// Serializable view of a node's position in the graph
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Branch>,
}

/// A validated, acyclic workflow graph
pub struct Graph {
    pub(super) name: String,
    pub(super) nodes: Vec<GraphNode>,
    pub(super) index: HashMap<String, usize>,
    pub(super) edges: Vec<ResolvedEdge>,
    pub(super) conditionals: Vec<ConditionalEdge>,
    pub(super) incoming: Vec<Vec<usize>>,
    pub(super) outgoing: Vec<Vec<usize>>,
    pub(super) topo_order: Vec<usize>,
    pub(super) entry: usize,
    pub(super) terminal: Option<usize>,
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declaration index of a node; this is also its producer rank for append fields
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, idx: usize) -> &GraphNode {
        &self.nodes[idx]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    pub fn edge(&self, idx: usize) -> &ResolvedEdge {
        &self.edges[idx]
    }

    pub fn conditional(&self, idx: usize) -> &ConditionalEdge {
        &self.conditionals[idx]
    }

    /// Edge indices entering a node
    pub fn incoming(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }

    /// Edge indices leaving a node
    pub fn outgoing(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node indices in dependency order (ties broken by declaration order)
    pub fn topo_order(&self) -> &[usize] {
        &self.topo_order
    }

    pub fn entry(&self) -> &str {
        &self.nodes[self.entry].id
    }

    pub fn terminal(&self) -> Option<&str> {
        self.terminal.map(|t| self.nodes[t].id.as_str())
    }

    pub(crate) fn terminal_index(&self) -> Option<usize> {
        self.terminal
    }

    /// Declared predecessors of a node, in declaration order, without duplicates
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        let Some(idx) = self.position(id) else {
            return Vec::new();
        };
        let mut preds: Vec<usize> = self.incoming[idx]
            .iter()
            .map(|&e| self.edges[e].from)
            .collect();
        preds.sort_unstable();
        preds.dedup();
        preds.into_iter().map(|p| self.nodes[p].id.as_str()).collect()
    }

    /// Topology description in dependency order
    pub fn describe(&self) -> Vec<NodeSummary> {
        self.topo_order
            .iter()
            .map(|&idx| {
                let id = &self.nodes[idx].id;
                let routes = self
                    .conditionals
                    .iter()
                    .filter(|c| &c.from == id)
                    .flat_map(|c| [c.then.clone(), c.otherwise.clone()])
                    .collect();
                NodeSummary {
                    id: id.clone(),
                    depends_on: self.predecessors(id).into_iter().map(String::from).collect(),
                    routes,
                }
            })
            .collect()
    }
}
