// SPDX-License-Identifier: MIT

//! The contact research workflow
//!
//! A fixed graph: profile research, site analysis, three presence branches
//! joined into a report, a consolidated report and a score. Qualified
//! subjects continue through outreach generation; every run ends in `persist`.

pub mod nodes;
pub mod prompts;

use std::sync::Arc;
use tokio::sync::mpsc;

pub use nodes::QUALIFICATION_THRESHOLD;

use crate::error::{LeadflowError, WorkflowError};
use crate::services::Services;
use crate::workflow::state::{Seed, WorkState};
use crate::workflow::{Branch, Graph, GraphBuilder, RunEvent, Scheduler};

pub const PROFILE_FETCH: &str = "profile_fetch";
pub const SITE_ANALYSIS: &str = "site_analysis";
pub const CONTENT_ANALYSIS: &str = "content_analysis";
pub const SOCIAL_ANALYSIS: &str = "social_analysis";
pub const NEWS_ANALYSIS: &str = "news_analysis";
pub const PRESENCE_REPORT: &str = "presence_report";
pub const CONSOLIDATED_REPORT: &str = "consolidated_report";
pub const SCORING: &str = "scoring";
pub const OUTREACH_REPORT: &str = "outreach_report";
pub const EMAIL_DRAFT: &str = "email_draft";
pub const INTERVIEW_SCRIPT: &str = "interview_script";
pub const PERSIST: &str = "persist";

/// Route predicate for the scoring gate
pub fn qualification_gate(state: &WorkState) -> bool {
    state.qualified()
}

/// Declare the research graph over the given collaborators
///
/// Declaration order fixes the order of documents, errors and completed
/// steps in the final state.
pub fn build_research_graph(services: &Services) -> Result<Graph, WorkflowError> {
    GraphBuilder::new("contact_research")
        .node(PROFILE_FETCH, Arc::new(nodes::ProfileFetch::new(services)))
        .node(SITE_ANALYSIS, Arc::new(nodes::SiteAnalysis::new(services)))
        .node(
            CONTENT_ANALYSIS,
            Arc::new(nodes::ContentAnalysis::new(services)),
        )
        .node(SOCIAL_ANALYSIS, Arc::new(nodes::SocialAnalysis))
        .node(NEWS_ANALYSIS, Arc::new(nodes::NewsAnalysis::new(services)))
        .node(
            PRESENCE_REPORT,
            Arc::new(nodes::PresenceReport::new(services)),
        )
        .node(
            CONSOLIDATED_REPORT,
            Arc::new(nodes::ConsolidatedReport::new(services)),
        )
        .node(SCORING, Arc::new(nodes::Scoring::new(services)))
        .node(
            OUTREACH_REPORT,
            Arc::new(nodes::OutreachReport::new(services)),
        )
        .node(EMAIL_DRAFT, Arc::new(nodes::EmailDraft::new(services)))
        .node(
            INTERVIEW_SCRIPT,
            Arc::new(nodes::InterviewScript::new(services)),
        )
        .node(PERSIST, Arc::new(nodes::Persist::new(services)))
        .entry(PROFILE_FETCH)
        .edge(PROFILE_FETCH, SITE_ANALYSIS)
        .fan_out(
            SITE_ANALYSIS,
            &[CONTENT_ANALYSIS, SOCIAL_ANALYSIS, NEWS_ANALYSIS],
        )
        .join(
            &[CONTENT_ANALYSIS, SOCIAL_ANALYSIS, NEWS_ANALYSIS],
            PRESENCE_REPORT,
        )
        .edge(PRESENCE_REPORT, CONSOLIDATED_REPORT)
        .edge(CONSOLIDATED_REPORT, SCORING)
        .conditional(
            SCORING,
            qualification_gate,
            Branch::new("qualified", OUTREACH_REPORT),
            Branch::new("not_qualified", PERSIST),
        )
        .edge(OUTREACH_REPORT, EMAIL_DRAFT)
        .edge(EMAIL_DRAFT, INTERVIEW_SCRIPT)
        .edge(INTERVIEW_SCRIPT, PERSIST)
        .terminal(PERSIST)
        .build()
}

/// The research graph bound to a scheduler
pub struct ResearchWorkflow {
    graph: Graph,
    scheduler: Scheduler,
}

impl ResearchWorkflow {
    pub fn new(services: &Services) -> Result<Self, LeadflowError> {
        Ok(Self {
            graph: build_research_graph(services)?,
            scheduler: Scheduler::new(),
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Research one subject and return the final state
    ///
    /// Fails only when the seed is invalid; collaborator failures end up in
    /// the state's error log.
    pub async fn run(&self, seed: Seed, owner_id: &str) -> Result<WorkState, LeadflowError> {
        let state = WorkState::from_seed(seed, owner_id)?;
        Ok(self.scheduler.run(&self.graph, state).await?)
    }

    /// Like [`run`](Self::run), reporting progress on `events`
    pub async fn run_with_events(
        &self,
        seed: Seed,
        owner_id: &str,
        events: mpsc::Sender<RunEvent>,
    ) -> Result<WorkState, LeadflowError> {
        let state = WorkState::from_seed(seed, owner_id)?;
        Ok(self
            .scheduler
            .run_with_events(&self.graph, state, events)
            .await?)
    }
}
