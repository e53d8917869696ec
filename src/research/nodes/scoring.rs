// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::LeadflowError;
use crate::research::prompts;
use crate::services::{strip_code_fences, Services, TextGenerator};
use crate::workflow::node::Node;
use crate::workflow::state::{PartialUpdate, ScoreDetail, WorkState};

pub const STEP: &str = "lead_scoring";

/// Lowest overall score (inclusive) that qualifies a subject
pub const QUALIFICATION_THRESHOLD: f64 = 6.0;

/// Highest overall score on the judgment scale
pub const MAX_SCORE: f64 = 10.0;

/// Parse the generator's judgment
///
/// Only a reply that is not a JSON object gets the fixed fallback. Loose
/// fields are read leniently, and an overall score off the 0 to 10 scale is
/// marked for review instead of qualifying.
pub fn parse_score(text: &str) -> ScoreDetail {
    let value = match serde_json::from_str::<Value>(strip_code_fences(text)) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            log::warn!("Score response was not a JSON object ({}); using fallback", other);
            return ScoreDetail::fallback();
        }
        Err(e) => {
            log::warn!("Score response could not be parsed ({}); using fallback", e);
            return ScoreDetail::fallback();
        }
    };

    let mut detail = match serde_json::from_value::<ScoreDetail>(value) {
        Ok(detail) => detail,
        Err(e) => {
            log::warn!("Score response had unreadable fields ({}); using fallback", e);
            return ScoreDetail::fallback();
        }
    };

    if !(0.0..=MAX_SCORE).contains(&detail.overall_score) {
        log::warn!(
            "Overall score {} is off the 0-{} scale; marking for review",
            detail.overall_score,
            MAX_SCORE
        );
        let fallback = ScoreDetail::fallback();
        detail.overall_score = fallback.overall_score;
        detail.qualification_status = fallback.qualification_status;
    }
    detail
}

/// Scoring input: the consolidated report, or whatever partial analyses exist
fn scoring_input(state: &WorkState) -> String {
    if let Some(report) = state.consolidated_report().filter(|r| !r.trim().is_empty()) {
        return report.to_string();
    }

    let sections = [
        ("Profile", state.profile_summary()),
        ("Website", state.site_analysis()),
        ("Blog", state.content_analysis()),
        ("Social Media", state.social_summary()),
        ("News", state.news_summary()),
        ("Digital Presence", state.presence_report()),
    ];
    let mut input = format!(
        "# Lead: {}\nCompany: {}\n",
        state.subject().name,
        state.subject().company_name
    );
    for (title, text) in sections {
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            input.push_str(&format!("\n## {}\n{}\n", title, text));
        }
    }
    input
}

/// Asks for a qualification judgment and derives the qualified flag locally
pub struct Scoring {
    generator: Arc<dyn TextGenerator>,
}

impl Scoring {
    pub fn new(services: &Services) -> Self {
        Self {
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for Scoring {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let reply = self
            .generator
            .generate(prompts::SCORING, &scoring_input(state))
            .await?;
        let detail = parse_score(&reply);
        let overall = detail.overall_score;
        let qualified = overall >= QUALIFICATION_THRESHOLD;
        log::info!(
            "Scored {} at {:.1} ({})",
            state.subject().name,
            overall,
            if qualified { "qualified" } else { "not qualified" }
        );

        Ok(PartialUpdate {
            score: Some(overall),
            score_detail: Some(detail),
            qualified: Some(qualified),
            ..PartialUpdate::step(STEP)
        })
    }
}
