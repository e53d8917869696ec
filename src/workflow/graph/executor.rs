// SPDX-License-Identifier: MIT

//! Graph scheduler
//!
//! Runs every node whose incoming edges are all decided as soon as at least
//! one of them was taken. Nodes in the same wave run concurrently on the
//! tokio runtime, each with a snapshot of the merged state; their updates are
//! merged one at a time as they finish. A node whose incoming edges were all
//! not taken is skipped, and its own outgoing edges become not taken, so a
//! branch that was not chosen never blocks a join further down.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::types::{EdgeKind, Graph};
use crate::error::{LeadflowError, WorkflowError};
use crate::workflow::node::RunEvent;
use crate::workflow::state::{PartialUpdate, WorkState};

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeStatus {
    Pending,
    Running,
    Done,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EdgeStatus {
    Undecided,
    Taken,
    NotTaken,
}

/// Per-run bookkeeping; the graph itself is never mutated
struct Progress {
    nodes: Vec<NodeStatus>,
    edges: Vec<EdgeStatus>,
}

impl Progress {
    fn new(graph: &Graph) -> Self {
        Self {
            nodes: vec![NodeStatus::Pending; graph.len()],
            edges: vec![EdgeStatus::Undecided; graph.edge_count()],
        }
    }

    /// Decide every pending node that can be decided now
    ///
    /// Returns the nodes that became ready and the nodes that were skipped.
    /// Walking in dependency order lets a skip cascade down a chain in one pass.
    fn advance(&mut self, graph: &Graph) -> (Vec<usize>, Vec<usize>) {
        let mut ready = Vec::new();
        let mut skipped = Vec::new();

        for &idx in graph.topo_order() {
            if self.nodes[idx] != NodeStatus::Pending {
                continue;
            }
            let incoming = graph.incoming(idx);
            if incoming.is_empty() {
                ready.push(idx);
                continue;
            }
            if incoming
                .iter()
                .any(|&e| self.edges[e] == EdgeStatus::Undecided)
            {
                continue;
            }
            if incoming.iter().any(|&e| self.edges[e] == EdgeStatus::Taken) {
                ready.push(idx);
            } else {
                self.nodes[idx] = NodeStatus::Skipped;
                for &e in graph.outgoing(idx) {
                    self.edges[e] = EdgeStatus::NotTaken;
                }
                skipped.push(idx);
            }
        }

        for &idx in &ready {
            self.nodes[idx] = NodeStatus::Running;
        }
        (ready, skipped)
    }
}

/// Executes graphs against a state
#[derive(Debug, Clone, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Run a graph to completion and return the final state
    pub async fn run(&self, graph: &Graph, state: WorkState) -> Result<WorkState, WorkflowError> {
        self.execute(graph, state, None).await
    }

    /// Run a graph, reporting progress on `events`
    ///
    /// Sends are awaited, so a bounded channel must be drained concurrently or
    /// sized for the whole run. A closed receiver is ignored.
    pub async fn run_with_events(
        &self,
        graph: &Graph,
        state: WorkState,
        events: mpsc::Sender<RunEvent>,
    ) -> Result<WorkState, WorkflowError> {
        self.execute(graph, state, Some(&events)).await
    }

    async fn execute(
        &self,
        graph: &Graph,
        mut state: WorkState,
        events: Option<&mpsc::Sender<RunEvent>>,
    ) -> Result<WorkState, WorkflowError> {
        let mut progress = Progress::new(graph);
        let mut tasks: JoinSet<(usize, Result<PartialUpdate, LeadflowError>)> = JoinSet::new();
        let mut wave = 0;

        log::info!(
            "Starting graph '{}' for run {} ({} nodes)",
            graph.name(),
            state.run_id(),
            graph.len()
        );

        loop {
            let (ready, skipped) = progress.advance(graph);

            for idx in skipped {
                let id = &graph.node(idx).id;
                log::info!("Skipping node {}: no incoming edge was taken", id);
                emit(events, RunEvent::NodeSkipped { node: id.clone() }).await;
            }

            if !ready.is_empty() {
                wave += 1;
                let ids: Vec<&str> = ready.iter().map(|&i| graph.node(i).id.as_str()).collect();
                log::info!("Graph wave {}: starting {} nodes: {:?}", wave, ids.len(), ids);

                let snapshot = Arc::new(state.clone());
                for idx in ready {
                    let node = Arc::clone(&graph.node(idx).node);
                    let snapshot = Arc::clone(&snapshot);
                    emit(
                        events,
                        RunEvent::NodeStarted {
                            node: graph.node(idx).id.clone(),
                        },
                    )
                    .await;
                    tasks.spawn(async move {
                        let result = AssertUnwindSafe(node.run(&snapshot)).catch_unwind().await;
                        let result = result.unwrap_or_else(|panic| {
                            Err(LeadflowError::other(format!(
                                "node panicked: {}",
                                panic_message(panic.as_ref())
                            )))
                        });
                        (idx, result)
                    });
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (idx, result) = joined.map_err(|e| WorkflowError::TaskJoin(e.to_string()))?;
            self.complete(graph, &mut progress, &mut state, idx, result, events)
                .await;
        }

        if let Some(terminal) = graph.terminal_index() {
            if progress.nodes[terminal] != NodeStatus::Done {
                log::warn!(
                    "Graph '{}' finished without running terminal node {}",
                    graph.name(),
                    graph.node(terminal).id
                );
            }
        }

        log::info!(
            "Graph '{}' finished run {} with {} errors",
            graph.name(),
            state.run_id(),
            state.errors().len()
        );
        emit(
            events,
            RunEvent::Finished {
                run_id: state.run_id().to_string(),
            },
        )
        .await;

        Ok(state)
    }

    /// Merge a finished node's outcome and decide its outgoing edges
    async fn complete(
        &self,
        graph: &Graph,
        progress: &mut Progress,
        state: &mut WorkState,
        idx: usize,
        result: Result<PartialUpdate, LeadflowError>,
        events: Option<&mpsc::Sender<RunEvent>>,
    ) {
        let id = &graph.node(idx).id;

        match result {
            Ok(update) => {
                log::debug!("Node {} updated {:?}", id, update.touched_fields());
                state.apply(idx, update);
                log::info!("Node {} completed", id);
            }
            Err(e) => {
                log::error!("Node {} failed: {}", id, e);
                let message = format!("{}: {}", id, e);
                state.apply(idx, PartialUpdate::default().with_error(message.clone()));
                emit(
                    events,
                    RunEvent::NodeFailed {
                        node: id.clone(),
                        error: message,
                    },
                )
                .await;
            }
        }
        progress.nodes[idx] = NodeStatus::Done;

        let (documents, errors, completed_steps) = state.append_lengths();
        emit(
            events,
            RunEvent::NodeCompleted {
                node: id.clone(),
                documents,
                errors,
                completed_steps,
            },
        )
        .await;

        // A conditional is decided once, against the state that includes this node's update
        let mut selected: Option<(usize, String)> = None;
        for &e in graph.outgoing(idx) {
            let edge = graph.edge(e);
            progress.edges[e] = match &edge.kind {
                EdgeKind::Static => EdgeStatus::Taken,
                EdgeKind::Branch { conditional, label } => {
                    let route = match &selected {
                        Some((c, route)) if c == conditional => route.clone(),
                        _ => {
                            let cond = graph.conditional(*conditional);
                            let branch = cond.select(state);
                            log::info!(
                                "Route from {}: {} -> {}",
                                cond.from,
                                branch.label,
                                branch.target
                            );
                            emit(
                                events,
                                RunEvent::RouteSelected {
                                    from: cond.from.clone(),
                                    route: branch.label.clone(),
                                    target: branch.target.clone(),
                                },
                            )
                            .await;
                            selected = Some((*conditional, branch.label.clone()));
                            branch.label.clone()
                        }
                    };
                    if &route == label {
                        EdgeStatus::Taken
                    } else {
                        EdgeStatus::NotTaken
                    }
                }
            };
        }
    }
}

async fn emit(events: Option<&mpsc::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::graph::{Branch, GraphBuilder};
    use crate::workflow::node::{FnNode, Node};
    use crate::workflow::state::{Document, Seed};
    use async_trait::async_trait;
    use std::time::Duration;

    fn state() -> WorkState {
        WorkState::from_seed(
            Seed {
                name: "Jane Doe".to_string(),
                company_name: "Acme".to_string(),
                ..Default::default()
            },
            "owner-1",
        )
        .unwrap()
    }

    /// Records its label as a completed step and a document after a delay
    struct Step {
        label: &'static str,
        delay_ms: u64,
    }

    #[async_trait]
    impl Node for Step {
        async fn run(&self, _state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            Ok(PartialUpdate::step(self.label)
                .with_document(Document::markdown(self.label, self.label, "")))
        }
    }

    fn step(label: &'static str, delay_ms: u64) -> Arc<dyn Node> {
        Arc::new(Step { label, delay_ms })
    }

    struct Failing;

    #[async_trait]
    impl Node for Failing {
        async fn run(&self, _state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
            Err(LeadflowError::other("upstream unavailable"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Node for Panicking {
        async fn run(&self, _state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
            panic!("boom");
        }
    }

    fn scorer(score: f64) -> Arc<dyn Node> {
        Arc::new(FnNode(
            move |_: &WorkState| -> Result<PartialUpdate, LeadflowError> {
                Ok(PartialUpdate {
                    score: Some(score),
                    qualified: Some(score >= 6.0),
                    ..PartialUpdate::step("scoring")
                })
            },
        ))
    }

    fn at_least_six(state: &WorkState) -> bool {
        state.score().unwrap_or(0.0) >= 6.0
    }

    /// score -> (outreach -> finish) | finish
    fn gated(score: f64) -> Graph {
        GraphBuilder::new("gated")
            .node("score", scorer(score))
            .node("outreach", step("outreach", 0))
            .node("finish", step("finish", 0))
            .conditional(
                "score",
                at_least_six,
                Branch::new("qualified", "outreach"),
                Branch::new("not_qualified", "finish"),
            )
            .edge("outreach", "finish")
            .entry("score")
            .terminal("finish")
            .build()
            .unwrap()
    }

    fn count(state: &WorkState, label: &str) -> usize {
        state.completed_steps().iter().filter(|s| *s == label).count()
    }

    #[tokio::test]
    async fn test_terminal_runs_once_on_qualified_route() {
        let result = Scheduler::new().run(&gated(7.2), state()).await.unwrap();

        assert_eq!(count(&result, "outreach"), 1);
        assert_eq!(count(&result, "finish"), 1);
        assert_eq!(
            result.completed_steps().to_vec(),
            vec!["scoring", "outreach", "finish"]
        );
    }

    #[tokio::test]
    async fn test_terminal_runs_once_on_unqualified_route() {
        let result = Scheduler::new().run(&gated(4.0), state()).await.unwrap();

        assert_eq!(count(&result, "outreach"), 0);
        assert_eq!(count(&result, "finish"), 1);
        assert_eq!(result.current_step(), "finish");
    }

    #[tokio::test]
    async fn test_gate_boundary() {
        let result = Scheduler::new().run(&gated(6.0), state()).await.unwrap();
        assert_eq!(count(&result, "outreach"), 1);

        let result = Scheduler::new().run(&gated(5.999), state()).await.unwrap();
        assert_eq!(count(&result, "outreach"), 0);
        assert_eq!(count(&result, "finish"), 1);
    }

    #[tokio::test]
    async fn test_fan_out_order_is_declaration_order() {
        // Later-declared branches finish first
        let graph = GraphBuilder::new("fan")
            .node("start", step("start", 0))
            .node("slow", step("slow", 60))
            .node("medium", step("medium", 30))
            .node("fast", step("fast", 0))
            .node("join", step("join", 0))
            .fan_out("start", &["slow", "medium", "fast"])
            .join(&["slow", "medium", "fast"], "join")
            .build()
            .unwrap();

        let result = Scheduler::new().run(&graph, state()).await.unwrap();

        assert_eq!(
            result.completed_steps().to_vec(),
            vec!["start", "slow", "medium", "fast", "join"]
        );
        let kinds: Vec<&str> = result.documents().iter().map(|d| d.kind()).collect();
        assert_eq!(kinds, vec!["start", "slow", "medium", "fast", "join"]);
        assert_eq!(result.current_step(), "join");
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_block_join() {
        let graph = GraphBuilder::new("partial")
            .node("start", step("start", 0))
            .node("good", step("good", 10))
            .node("bad", Arc::new(Failing))
            .node("join", step("join", 0))
            .fan_out("start", &["good", "bad"])
            .join(&["good", "bad"], "join")
            .build()
            .unwrap();

        let result = Scheduler::new().run(&graph, state()).await.unwrap();

        assert_eq!(count(&result, "join"), 1);
        assert_eq!(
            result.errors().to_vec(),
            vec!["bad: upstream unavailable".to_string()]
        );
        // A failed node contributes no completed step
        assert_eq!(
            result.completed_steps().to_vec(),
            vec!["start", "good", "join"]
        );
    }

    #[tokio::test]
    async fn test_panicking_node_is_recorded() {
        let graph = GraphBuilder::new("panic")
            .node("explode", Arc::new(Panicking))
            .node("after", step("after", 0))
            .edge("explode", "after")
            .build()
            .unwrap();

        let result = Scheduler::new().run(&graph, state()).await.unwrap();

        assert_eq!(result.errors().len(), 1);
        let error = result.errors().iter().next().unwrap();
        assert!(error.starts_with("explode: "));
        assert!(error.contains("boom"));
        assert_eq!(count(&result, "after"), 1);
    }

    #[tokio::test]
    async fn test_skip_cascades_down_unselected_chain() {
        // gate -> (a -> b -> end) | end
        let graph = GraphBuilder::new("chain")
            .node("gate", scorer(1.0))
            .node("a", step("a", 0))
            .node("b", step("b", 0))
            .node("end", step("end", 0))
            .conditional(
                "gate",
                at_least_six,
                Branch::new("qualified", "a"),
                Branch::new("not_qualified", "end"),
            )
            .edge("a", "b")
            .edge("b", "end")
            .terminal("end")
            .build()
            .unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let result = Scheduler::new()
            .run_with_events(&graph, state(), tx)
            .await
            .unwrap();

        assert_eq!(result.completed_steps().to_vec(), vec!["scoring", "end"]);

        let mut skipped = Vec::new();
        let mut routes = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::NodeSkipped { node } => skipped.push(node),
                RunEvent::RouteSelected { route, .. } => routes.push(route),
                _ => {}
            }
        }
        assert_eq!(skipped, vec!["a", "b"]);
        assert_eq!(routes, vec!["not_qualified"]);
    }

    #[tokio::test]
    async fn test_append_lengths_monotonic_across_merges() {
        let graph = GraphBuilder::new("events")
            .node("start", step("start", 0))
            .node("x", step("x", 20))
            .node("y", Arc::new(Failing))
            .node("z", step("z", 5))
            .node("end", step("end", 0))
            .fan_out("start", &["x", "y", "z"])
            .join(&["x", "y", "z"], "end")
            .build()
            .unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let result = Scheduler::new()
            .run_with_events(&graph, state(), tx)
            .await
            .unwrap();

        let mut previous = (0, 0, 0);
        let mut merges = 0;
        let mut finished = false;
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::NodeCompleted {
                    documents,
                    errors,
                    completed_steps,
                    ..
                } => {
                    assert!(documents >= previous.0);
                    assert!(errors >= previous.1);
                    assert!(completed_steps >= previous.2);
                    previous = (documents, errors, completed_steps);
                    merges += 1;
                }
                RunEvent::Finished { run_id } => {
                    assert_eq!(run_id, result.run_id().to_string());
                    finished = true;
                }
                _ => {}
            }
        }

        assert_eq!(merges, 5);
        assert!(finished);
        assert_eq!(previous, result.append_lengths());
    }

    #[tokio::test]
    async fn test_join_sees_all_predecessor_output() {
        let graph = GraphBuilder::new("snapshot")
            .node("start", step("start", 0))
            .node("left", step("left", 15))
            .node("right", step("right", 0))
            .node(
                "join",
                Arc::new(FnNode(
                    |state: &WorkState| -> Result<PartialUpdate, LeadflowError> {
                        Ok(PartialUpdate {
                            consolidated_report: Some(format!(
                                "{} documents",
                                state.documents().len()
                            )),
                            ..PartialUpdate::step("join")
                        })
                    },
                )),
            )
            .fan_out("start", &["left", "right"])
            .join(&["left", "right"], "join")
            .build()
            .unwrap();

        let result = Scheduler::new().run(&graph, state()).await.unwrap();
        assert_eq!(result.consolidated_report(), Some("3 documents"));
    }
}
