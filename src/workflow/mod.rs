// SPDX-License-Identifier: MIT

//! Workflow engine
//!
//! - `state` - the typed run state and its per-field merge policies
//! - `node` - the unit-of-work contract and run events
//! - `graph` - graph declaration, validation and concurrent scheduling

pub mod graph;
pub mod node;
pub mod state;

pub use graph::{Branch, Graph, GraphBuilder, Scheduler};
pub use node::{FnNode, Node, RunEvent};
pub use state::{PartialUpdate, WorkState};
