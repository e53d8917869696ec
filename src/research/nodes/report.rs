// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use super::or_missing;
use crate::error::LeadflowError;
use crate::research::prompts;
use crate::services::{Services, TextGenerator};
use crate::workflow::node::Node;
use crate::workflow::state::{Document, PartialUpdate, WorkState};

pub const STEP: &str = "consolidated_report";

/// Everything known about the subject, as sections for the report prompt
pub(crate) fn research_sections(state: &WorkState) -> String {
    let subject = state.subject();
    let organization = state.organization();
    let company = if organization.name.is_empty() {
        subject.company_name.as_str()
    } else {
        organization.name.as_str()
    };
    let description = if organization.description.is_empty() {
        None
    } else {
        Some(organization.description.as_str())
    };
    let site = if organization.site.is_empty() {
        None
    } else {
        Some(organization.site.as_str())
    };

    format!(
        "# Lead: {}\nEmail: {}\nCompany: {}\n\n## Profile\n{}\n\n## Company Information\nDescription: {}\nWebsite: {}\n\n## Digital Presence\n{}",
        subject.name,
        or_missing(Some(subject.email.as_str())),
        or_missing(Some(company)),
        or_missing(state.profile_summary()),
        or_missing(description),
        or_missing(site),
        or_missing(state.presence_report()),
    )
}

/// Merges the profile, company and presence research into one report
pub struct ConsolidatedReport {
    generator: Arc<dyn TextGenerator>,
}

impl ConsolidatedReport {
    pub fn new(services: &Services) -> Self {
        Self {
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for ConsolidatedReport {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let report = self
            .generator
            .generate(prompts::CONSOLIDATED_REPORT, &research_sections(state))
            .await?;

        Ok(PartialUpdate {
            consolidated_report: Some(report.clone()),
            ..PartialUpdate::step(STEP)
        }
        .with_document(
            Document::markdown("consolidated_report", "Consolidated Lead Report", report)
                .with_metadata("lead_name", state.subject().name.as_str()),
        ))
    }
}
