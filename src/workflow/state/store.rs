// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::records::{Document, Organization, OutreachArtifacts, ScoreDetail, Seed, Subject};
use super::schema::StateField;
use crate::error::LeadflowError;

/// Storage for an append-policy field
///
/// Every entry is tagged with the declaration index of the node that produced
/// it. Entries stay ordered by that index, then by position within the
/// producer's contribution, so concurrent producers always read back in graph
/// declaration order no matter when they finished.
#[derive(Debug, Clone)]
pub struct Appended<T> {
    entries: Vec<Tagged<T>>,
}

#[derive(Debug, Clone)]
struct Tagged<T> {
    producer: usize,
    value: T,
}

impl<T> Appended<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a producer's entries after everything from producers declared at or before it
    pub fn extend<I>(&mut self, producer: usize, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut at = self.entries.partition_point(|e| e.producer <= producer);
        for value in items {
            self.entries.insert(at, Tagged { producer, value });
            at += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.value)
    }

    /// Entries contributed by a single producer
    pub fn from_producer(&self, producer: usize) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(move |e| e.producer == producer)
            .map(|e| &e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Appended<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> Default for Appended<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Serialize for Appended<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(&entry.value)?;
        }
        seq.end()
    }
}

/// Sparse update returned by a node
///
/// Replace-policy fields are `Option`s (`None` leaves the field alone);
/// append-policy fields are `Vec`s whose entries are added. The subject is
/// not part of an update: it is fixed when the run starts.
#[derive(Debug, Clone, Default)]
pub struct PartialUpdate {
    pub organization: Option<Organization>,
    pub profile_summary: Option<String>,
    pub site_analysis: Option<String>,
    pub content_analysis: Option<String>,
    pub social_summary: Option<String>,
    pub news_summary: Option<String>,
    pub presence_report: Option<String>,
    pub consolidated_report: Option<String>,
    pub score: Option<f64>,
    pub score_detail: Option<ScoreDetail>,
    pub qualified: Option<bool>,
    pub outreach: Option<OutreachArtifacts>,
    pub documents: Vec<Document>,
    pub errors: Vec<String>,
    pub completed_steps: Vec<String>,
    pub current_step: Option<String>,
}

impl PartialUpdate {
    /// Update that labels the current step and records it as completed
    pub fn step(label: &str) -> Self {
        Self {
            current_step: Some(label.to_string()),
            completed_steps: vec![label.to_string()],
            ..Default::default()
        }
    }

    /// Update that only records a completed step
    pub fn completed(label: &str) -> Self {
        Self {
            completed_steps: vec![label.to_string()],
            ..Default::default()
        }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Fields this update names
    pub fn touched_fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        let mut touch = |present: bool, field: StateField| {
            if present {
                fields.push(field);
            }
        };
        touch(self.organization.is_some(), StateField::Organization);
        touch(self.profile_summary.is_some(), StateField::ProfileSummary);
        touch(self.site_analysis.is_some(), StateField::SiteAnalysis);
        touch(self.content_analysis.is_some(), StateField::ContentAnalysis);
        touch(self.social_summary.is_some(), StateField::SocialSummary);
        touch(self.news_summary.is_some(), StateField::NewsSummary);
        touch(self.presence_report.is_some(), StateField::PresenceReport);
        touch(
            self.consolidated_report.is_some(),
            StateField::ConsolidatedReport,
        );
        touch(self.score.is_some(), StateField::Score);
        touch(self.score_detail.is_some(), StateField::ScoreDetail);
        touch(self.qualified.is_some(), StateField::Qualified);
        touch(self.outreach.is_some(), StateField::Outreach);
        touch(!self.documents.is_empty(), StateField::Documents);
        touch(!self.errors.is_empty(), StateField::Errors);
        touch(!self.completed_steps.is_empty(), StateField::CompletedSteps);
        touch(self.current_step.is_some(), StateField::CurrentStep);
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }
}

/// The record threaded through every node of a run
#[derive(Debug, Clone, Serialize)]
pub struct WorkState {
    run_id: Uuid,
    owner_id: String,
    subject: Subject,
    organization: Organization,
    profile_summary: Option<String>,
    site_analysis: Option<String>,
    content_analysis: Option<String>,
    social_summary: Option<String>,
    news_summary: Option<String>,
    presence_report: Option<String>,
    consolidated_report: Option<String>,
    score: Option<f64>,
    score_detail: Option<ScoreDetail>,
    qualified: bool,
    outreach: OutreachArtifacts,
    documents: Appended<Document>,
    errors: Appended<String>,
    completed_steps: Appended<String>,
    current_step: String,
}

impl WorkState {
    /// Create the initial state for a run from a seed record
    ///
    /// The seed must name the subject. The organization starts out with the
    /// seed's company name and site.
    pub fn from_seed(seed: Seed, owner_id: impl Into<String>) -> Result<Self, LeadflowError> {
        if seed.name.trim().is_empty() {
            return Err(LeadflowError::InvalidSeed(
                "subject name is required".to_string(),
            ));
        }
        Ok(Self::new(Subject::from(seed), owner_id))
    }

    /// Create the initial state for a subject without validation
    pub fn new(subject: Subject, owner_id: impl Into<String>) -> Self {
        let organization = Organization {
            name: subject.company_name.clone(),
            site: subject.company_site.clone(),
            profile_url: subject.company_profile_url.clone(),
            ..Default::default()
        };

        Self {
            run_id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            subject,
            organization,
            profile_summary: None,
            site_analysis: None,
            content_analysis: None,
            social_summary: None,
            news_summary: None,
            presence_report: None,
            consolidated_report: None,
            score: None,
            score_detail: None,
            qualified: false,
            outreach: OutreachArtifacts::default(),
            documents: Appended::new(),
            errors: Appended::new(),
            completed_steps: Appended::new(),
            current_step: "initialized".to_string(),
        }
    }

    /// Merge a node's update into this state using each field's policy
    pub fn apply(&mut self, producer: usize, update: PartialUpdate) {
        // Destructured so that a new field cannot be added without a reducer here
        let PartialUpdate {
            organization,
            profile_summary,
            site_analysis,
            content_analysis,
            social_summary,
            news_summary,
            presence_report,
            consolidated_report,
            score,
            score_detail,
            qualified,
            outreach,
            documents,
            errors,
            completed_steps,
            current_step,
        } = update;

        replace(&mut self.organization, organization);
        replace_opt(&mut self.profile_summary, profile_summary);
        replace_opt(&mut self.site_analysis, site_analysis);
        replace_opt(&mut self.content_analysis, content_analysis);
        replace_opt(&mut self.social_summary, social_summary);
        replace_opt(&mut self.news_summary, news_summary);
        replace_opt(&mut self.presence_report, presence_report);
        replace_opt(&mut self.consolidated_report, consolidated_report);
        replace_opt(&mut self.score, score);
        replace_opt(&mut self.score_detail, score_detail);
        replace(&mut self.qualified, qualified);
        replace(&mut self.outreach, outreach);
        replace(&mut self.current_step, current_step);

        self.documents.extend(producer, documents);
        self.errors.extend(producer, errors);
        self.completed_steps.extend(producer, completed_steps);
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn organization(&self) -> &Organization {
        &self.organization
    }

    pub fn profile_summary(&self) -> Option<&str> {
        self.profile_summary.as_deref()
    }

    pub fn site_analysis(&self) -> Option<&str> {
        self.site_analysis.as_deref()
    }

    pub fn content_analysis(&self) -> Option<&str> {
        self.content_analysis.as_deref()
    }

    pub fn social_summary(&self) -> Option<&str> {
        self.social_summary.as_deref()
    }

    pub fn news_summary(&self) -> Option<&str> {
        self.news_summary.as_deref()
    }

    pub fn presence_report(&self) -> Option<&str> {
        self.presence_report.as_deref()
    }

    pub fn consolidated_report(&self) -> Option<&str> {
        self.consolidated_report.as_deref()
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn score_detail(&self) -> Option<&ScoreDetail> {
        self.score_detail.as_ref()
    }

    pub fn qualified(&self) -> bool {
        self.qualified
    }

    pub fn outreach(&self) -> &OutreachArtifacts {
        &self.outreach
    }

    pub fn documents(&self) -> &Appended<Document> {
        &self.documents
    }

    pub fn errors(&self) -> &Appended<String> {
        &self.errors
    }

    pub fn completed_steps(&self) -> &Appended<String> {
        &self.completed_steps
    }

    pub fn current_step(&self) -> &str {
        &self.current_step
    }

    /// Lengths of the append-policy fields: (documents, errors, completed steps)
    pub fn append_lengths(&self) -> (usize, usize, usize) {
        (
            self.documents.len(),
            self.errors.len(),
            self.completed_steps.len(),
        )
    }
}

/// Pure form of [`WorkState::apply`]
pub fn merge(old: WorkState, producer: usize, partial: PartialUpdate) -> WorkState {
    let mut new = old;
    new.apply(producer, partial);
    new
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn replace_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
