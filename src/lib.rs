// SPDX-License-Identifier: MIT

//! leadflow-rs - contact enrichment and qualification workflows
//!
//! - [`workflow`] - typed run state, the node contract, graph building and scheduling
//! - [`services`] - collaborator traits and their HTTP implementations
//! - [`research`] - the research graph and its nodes
//! - [`model`] - text-generation model clients
//! - [`config`] - layered runtime settings

pub mod config;
pub mod error;
pub mod model;
pub mod research;
pub mod services;
pub mod workflow;

pub use error::{LeadflowError, WorkflowError};
pub use research::ResearchWorkflow;
