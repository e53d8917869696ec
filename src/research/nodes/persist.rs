// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{LeadflowError, ServiceError};
use crate::services::{Persistence, Services, SubjectStatus};
use crate::workflow::node::Node;
use crate::workflow::state::{PartialUpdate, WorkState};

pub const STEP: &str = "saving";

/// Writes the run's results to the store
///
/// Every store call is attempted; a failed call adds a "Persistence error"
/// entry and the rest still run.
pub struct Persist {
    store: Arc<dyn Persistence>,
}

impl Persist {
    pub fn new(services: &Services) -> Self {
        Self {
            store: Arc::clone(&services.store),
        }
    }
}

fn record(update: &mut PartialUpdate, result: Result<(), ServiceError>) {
    if let Err(e) = result {
        log::warn!("Persistence call failed: {}", e);
        update.errors.push(format!("Persistence error: {}", e));
    }
}

#[async_trait]
impl Node for Persist {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let mut update = PartialUpdate::step(STEP);

        let run_id = state.run_id().to_string();
        let subject_id = match state.subject().id.as_str() {
            "" => run_id.as_str(),
            id => id,
        };
        let owner_id = state.owner_id();
        let status = SubjectStatus::from_qualified(state.qualified());
        let score = state.score().unwrap_or(0.0);

        log::info!(
            "Saving {} as {} (score {:.1})",
            subject_id,
            status.as_str(),
            score
        );

        record(
            &mut update,
            self.store
                .update_subject_status_and_score(subject_id, status, score, state.score_detail())
                .await,
        );
        record(
            &mut update,
            self.store
                .upsert_organization(subject_id, state.organization())
                .await,
        );

        let documents = state.documents().to_vec();
        if !documents.is_empty() {
            record(
                &mut update,
                self.store
                    .insert_documents(subject_id, owner_id, &documents)
                    .await,
            );
        }

        let outreach = state.outreach();
        if outreach.body.is_some() || outreach.script.is_some() {
            record(
                &mut update,
                self.store
                    .insert_outreach_artifacts(subject_id, owner_id, outreach)
                    .await,
            );
        }

        Ok(update)
    }
}
