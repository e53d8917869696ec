// SPDX-License-Identifier: MIT

//! Node contract - the uniform shape of every unit of work in a graph

use crate::error::LeadflowError;
use crate::workflow::state::{PartialUpdate, WorkState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A unit of work: reads a state snapshot, returns a sparse update
///
/// Nodes never mutate shared state. The snapshot is taken after all of the
/// node's predecessors have merged; anything the node wants to change goes
/// through the returned [`PartialUpdate`]. An `Err` is recorded in the error
/// log by the scheduler and does not stop the run.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError>;
}

/// Adapter for nodes that need no collaborator calls
pub struct FnNode<F>(pub F);

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: Fn(&WorkState) -> Result<PartialUpdate, LeadflowError> + Send + Sync,
{
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        (self.0)(state)
    }
}

/// Progress events emitted while a graph runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RunEvent {
    NodeStarted {
        node: String,
    },
    /// Lengths of the append-policy fields after the node's update was merged
    NodeCompleted {
        node: String,
        documents: usize,
        errors: usize,
        completed_steps: usize,
    },
    NodeFailed {
        node: String,
        error: String,
    },
    NodeSkipped {
        node: String,
    },
    RouteSelected {
        from: String,
        route: String,
        target: String,
    },
    Finished {
        run_id: String,
    },
}
