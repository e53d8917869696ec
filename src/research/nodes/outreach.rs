// SPDX-License-Identifier: MIT

//! Outreach material for qualified subjects
//!
//! The three nodes run in sequence and each one extends the outreach record
//! it finds in the state, so earlier pieces are never lost.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::or_missing;
use crate::error::LeadflowError;
use crate::research::prompts;
use crate::services::{strip_code_fences, Services, TextGenerator};
use crate::workflow::node::Node;
use crate::workflow::state::{Document, PartialUpdate, WorkState};

pub const REPORT_STEP: &str = "outreach_report";
pub const EMAIL_STEP: &str = "email_generation";
pub const SCRIPT_STEP: &str = "interview_script_generation";

const FALLBACK_SUBJECT: &str = "Quick Question";
const FALLBACK_BODY: &str = "Hi, I wanted to reach out regarding potential opportunities.";

/// Prospect context shared by the outreach prompts
fn prospect_context(state: &WorkState) -> String {
    let subject = state.subject();
    let company = match state.organization().name.as_str() {
        "" => subject.company_name.as_str(),
        name => name,
    };
    let mut context = format!(
        "# Prospect: {}\nCompany: {}\n\n## Research\n{}",
        subject.name,
        or_missing(Some(company)),
        or_missing(state.consolidated_report()),
    );
    if let Some(detail) = state.score_detail() {
        context.push_str(&format!(
            "\n\n## Qualification\nOverall score: {:.1}\n{}",
            detail.overall_score, detail.reasoning
        ));
    }
    context
}

/// Writes the personalized outreach report
pub struct OutreachReport {
    generator: Arc<dyn TextGenerator>,
}

impl OutreachReport {
    pub fn new(services: &Services) -> Self {
        Self {
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for OutreachReport {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let report = self
            .generator
            .generate(prompts::OUTREACH_REPORT, &prospect_context(state))
            .await?;

        Ok(PartialUpdate {
            outreach: Some(state.outreach().clone().with_report(report.clone())),
            ..PartialUpdate::step(REPORT_STEP)
        }
        .with_document(Document::markdown(
            "outreach_report",
            "Personalized Outreach Report",
            report,
        )))
    }
}

#[derive(Debug, Deserialize)]
struct EmailReply {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    email: String,
}

/// Subject and body from the generator's reply, with fixed fallbacks for missing parts
pub fn parse_email(text: &str) -> (String, String) {
    let reply = match serde_json::from_str::<EmailReply>(strip_code_fences(text)) {
        Ok(reply) => reply,
        Err(e) => {
            log::warn!("Email draft could not be parsed ({}); using fallback", e);
            return (FALLBACK_SUBJECT.to_string(), FALLBACK_BODY.to_string());
        }
    };
    let subject = match reply.subject.trim() {
        "" => FALLBACK_SUBJECT.to_string(),
        s => s.to_string(),
    };
    let body = match reply.email.trim() {
        "" => FALLBACK_BODY.to_string(),
        b => b.to_string(),
    };
    (subject, body)
}

/// Drafts the cold email
pub struct EmailDraft {
    generator: Arc<dyn TextGenerator>,
}

impl EmailDraft {
    pub fn new(services: &Services) -> Self {
        Self {
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for EmailDraft {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let mut context = prospect_context(state);
        if let Some(report) = state.outreach().report.as_deref() {
            context.push_str(&format!("\n\n## Outreach Report\n{}", report));
        }
        let reply = self.generator.generate(prompts::EMAIL_DRAFT, &context).await?;
        let (subject, body) = parse_email(&reply);

        Ok(PartialUpdate {
            outreach: Some(
                state
                    .outreach()
                    .clone()
                    .with_email(subject.clone(), body.clone()),
            ),
            ..PartialUpdate::completed(EMAIL_STEP)
        }
        .with_document(
            Document::markdown("email_draft", format!("Email: {}", subject), body)
                .with_metadata("subject", subject),
        ))
    }
}

/// Prepares the discovery call script
pub struct InterviewScript {
    generator: Arc<dyn TextGenerator>,
}

impl InterviewScript {
    pub fn new(services: &Services) -> Self {
        Self {
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for InterviewScript {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let script = self
            .generator
            .generate(prompts::INTERVIEW_SCRIPT, &prospect_context(state))
            .await?;

        Ok(PartialUpdate {
            outreach: Some(state.outreach().clone().with_script(script.clone())),
            ..PartialUpdate::completed(SCRIPT_STEP)
        }
        .with_document(Document::markdown(
            "interview_script",
            "Discovery Call Script",
            script,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::nodes::testing::{services_with, state, StubGenerator};

    #[test]
    fn test_parse_email() {
        let (subject, body) =
            parse_email("```json\n{\"subject\": \"Widgets at Acme\", \"email\": \"Hi Jane\"}\n```");
        assert_eq!(subject, "Widgets at Acme");
        assert_eq!(body, "Hi Jane");

        let (subject, body) = parse_email("Subject: hello");
        assert_eq!(subject, FALLBACK_SUBJECT);
        assert_eq!(body, FALLBACK_BODY);

        let (subject, body) = parse_email(r#"{"email": "Only a body"}"#);
        assert_eq!(subject, FALLBACK_SUBJECT);
        assert_eq!(body, "Only a body");
    }

    #[tokio::test]
    async fn test_nodes_keep_sibling_artifacts() {
        let services = services_with(
            StubGenerator::new()
                .reply(prompts::OUTREACH_REPORT, "Report for Acme")
                .reply(prompts::EMAIL_DRAFT, r#"{"subject": "Hi", "email": "Body"}"#)
                .reply(prompts::INTERVIEW_SCRIPT, "Script"),
        );
        let mut state = state();

        let update = OutreachReport::new(&services).run(&state).await.unwrap();
        assert_eq!(update.current_step.as_deref(), Some(REPORT_STEP));
        state.apply(0, update);

        let update = EmailDraft::new(&services).run(&state).await.unwrap();
        assert_eq!(update.completed_steps, vec![EMAIL_STEP]);
        assert_eq!(update.documents[0].title(), "Email: Hi");
        state.apply(1, update);

        let update = InterviewScript::new(&services).run(&state).await.unwrap();
        state.apply(2, update);

        let outreach = state.outreach();
        assert_eq!(outreach.report.as_deref(), Some("Report for Acme"));
        assert_eq!(outreach.subject.as_deref(), Some("Hi"));
        assert_eq!(outreach.body.as_deref(), Some("Body"));
        assert_eq!(outreach.script.as_deref(), Some("Script"));
        assert_eq!(state.documents().len(), 3);
    }

    #[tokio::test]
    async fn test_email_draft_falls_back_on_prose() {
        let services =
            services_with(StubGenerator::new().reply(prompts::EMAIL_DRAFT, "Dear Jane, ..."));
        let update = EmailDraft::new(&services).run(&state()).await.unwrap();
        let outreach = update.outreach.unwrap();
        assert_eq!(outreach.subject.as_deref(), Some(FALLBACK_SUBJECT));
        assert_eq!(outreach.body.as_deref(), Some(FALLBACK_BODY));
    }
}
