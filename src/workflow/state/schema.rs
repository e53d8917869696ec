// SPDX-License-Identifier: MIT

//! Per-field merge policy declarations

use serde::Serialize;

/// How a partial update combines with the existing field value
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Last writer wins
    Replace,
    /// New entries are added; existing entries are never removed
    Append,
}

/// Every field of the work state
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Subject,
    Organization,
    ProfileSummary,
    SiteAnalysis,
    ContentAnalysis,
    SocialSummary,
    NewsSummary,
    PresenceReport,
    ConsolidatedReport,
    Score,
    ScoreDetail,
    Qualified,
    Outreach,
    Documents,
    Errors,
    CompletedSteps,
    CurrentStep,
}

impl StateField {
    pub const ALL: [StateField; 17] = [
        StateField::Subject,
        StateField::Organization,
        StateField::ProfileSummary,
        StateField::SiteAnalysis,
        StateField::ContentAnalysis,
        StateField::SocialSummary,
        StateField::NewsSummary,
        StateField::PresenceReport,
        StateField::ConsolidatedReport,
        StateField::Score,
        StateField::ScoreDetail,
        StateField::Qualified,
        StateField::Outreach,
        StateField::Documents,
        StateField::Errors,
        StateField::CompletedSteps,
        StateField::CurrentStep,
    ];

    /// The reducer declared for this field
    pub fn policy(self) -> MergePolicy {
        match self {
            StateField::Documents | StateField::Errors | StateField::CompletedSteps => {
                MergePolicy::Append
            }
            _ => MergePolicy::Replace,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StateField::Subject => "subject",
            StateField::Organization => "organization",
            StateField::ProfileSummary => "profile_summary",
            StateField::SiteAnalysis => "site_analysis",
            StateField::ContentAnalysis => "content_analysis",
            StateField::SocialSummary => "social_summary",
            StateField::NewsSummary => "news_summary",
            StateField::PresenceReport => "presence_report",
            StateField::ConsolidatedReport => "consolidated_report",
            StateField::Score => "score",
            StateField::ScoreDetail => "score_detail",
            StateField::Qualified => "qualified",
            StateField::Outreach => "outreach",
            StateField::Documents => "documents",
            StateField::Errors => "errors",
            StateField::CompletedSteps => "completed_steps",
            StateField::CurrentStep => "current_step",
        }
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
