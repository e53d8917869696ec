// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `WorkState` - the record threaded through a run, with a declared reducer per field
//! - `PartialUpdate` - the sparse update a node returns
//! - `MergePolicy` / `StateField` - the per-field reducer table

mod records;
mod schema;
mod store;

pub use records::{
    Document, Organization, OutreachArtifacts, ScoreDetail, Seed, SocialLinks, Subject,
};
pub use schema::{MergePolicy, StateField};
pub use store::{merge, Appended, PartialUpdate, WorkState};
