// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! This module provides the graph builder and the scheduler that runs
//! nodes once their incoming edges are decided.

mod builder;
pub mod executor;
pub mod types;

pub use builder::GraphBuilder;
pub use executor::Scheduler;
pub use types::{Branch, ConditionalEdge, Graph, GraphNode, NodeSummary, Predicate};
