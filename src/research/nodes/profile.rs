// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::LeadflowError;
use crate::research::prompts;
use crate::services::profile::{company_profile_url, format_profile, organization_from_company};
use crate::services::{ProfileLookup, Services, TextGenerator};
use crate::workflow::node::Node;
use crate::workflow::state::{Document, PartialUpdate, WorkState};

pub const STEP: &str = "profile_research";

/// Locates and summarizes the subject's professional profile
///
/// A missing profile is not a failure: the run continues with the seed data
/// and a placeholder summary.
pub struct ProfileFetch {
    profiles: Arc<dyn ProfileLookup>,
    generator: Arc<dyn TextGenerator>,
}

impl ProfileFetch {
    pub fn new(services: &Services) -> Self {
        Self {
            profiles: Arc::clone(&services.profiles),
            generator: Arc::clone(&services.generator),
        }
    }

    async fn locate(&self, state: &WorkState) -> Result<Option<String>, LeadflowError> {
        let subject = state.subject();
        if !subject.profile_url.is_empty() {
            return Ok(Some(subject.profile_url.clone()));
        }
        if subject.company_name.is_empty() {
            return Ok(None);
        }
        Ok(self
            .profiles
            .find(&subject.name, &subject.company_name)
            .await?)
    }
}

#[async_trait]
impl Node for ProfileFetch {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let mut update = PartialUpdate::step(STEP);

        let Some(url) = self.locate(state).await? else {
            log::info!("No profile found for {}", state.subject().name);
            update.profile_summary = Some("Profile not found.".to_string());
            return Ok(update.with_error("Could not find profile URL."));
        };

        let profile = self.profiles.fetch(&url).await?;
        let summary = self
            .generator
            .generate(prompts::PROFILE_SUMMARY, &format_profile(&profile))
            .await?;

        update.profile_summary = Some(summary.clone());
        update = update.with_document(
            Document::markdown("profile_summary", "Profile Analysis", summary)
                .with_metadata("profile_url", url.as_str()),
        );

        let company_url = company_profile_url(&profile)
            .map(str::to_string)
            .or_else(|| Some(state.subject().company_profile_url.clone()))
            .filter(|u| !u.is_empty());

        if let Some(company_url) = company_url {
            match self.profiles.fetch(&company_url).await {
                Ok(company) => {
                    let current = state.organization();
                    let profile_site = profile
                        .get("company_website")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    let mut organization =
                        organization_from_company(&company, &company_url, &current.site);
                    if !profile_site.is_empty() {
                        organization.site = profile_site.to_string();
                    }
                    if organization.name.is_empty() {
                        organization.name = current.name.clone();
                    }
                    organization.social = current.social.clone();
                    update.organization = Some(organization);
                }
                Err(e) => {
                    log::warn!("Company profile {} could not be fetched: {}", company_url, e);
                    update = update.with_error(format!("Company profile error: {}", e));
                }
            }
        }

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::nodes::testing::{services_with, state, StubGenerator, StubProfiles};
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_profile_records_placeholder() {
        let services = services_with(StubGenerator::new());
        let update = ProfileFetch::new(&services).run(&state()).await.unwrap();

        assert_eq!(update.profile_summary.as_deref(), Some("Profile not found."));
        assert_eq!(update.errors, vec!["Could not find profile URL."]);
        assert_eq!(update.completed_steps, vec![STEP]);
        assert!(update.documents.is_empty());
    }

    #[tokio::test]
    async fn test_profile_and_company_are_fetched() {
        let profiles = StubProfiles::found("https://linkedin.com/in/jane")
            .with_profile(
                "https://linkedin.com/in/jane",
                json!({
                    "full_name": "Jane Doe",
                    "company_linkedin_url": "https://linkedin.com/company/acme",
                    "company_website": "https://acme.test"
                }),
            )
            .with_profile(
                "https://linkedin.com/company/acme",
                json!({ "company_name": "Acme Inc", "description": "Widgets" }),
            );
        let services = Services {
            profiles: Arc::new(profiles),
            ..services_with(StubGenerator::new().reply(prompts::PROFILE_SUMMARY, "Jane leads growth."))
        };

        let update = ProfileFetch::new(&services).run(&state()).await.unwrap();

        assert_eq!(update.profile_summary.as_deref(), Some("Jane leads growth."));
        assert_eq!(update.documents.len(), 1);
        let org = update.organization.unwrap();
        assert_eq!(org.name, "Acme Inc");
        assert_eq!(org.site, "https://acme.test");
        assert_eq!(org.profile_url, "https://linkedin.com/company/acme");
        assert!(update.errors.is_empty());
    }

    #[tokio::test]
    async fn test_company_fetch_failure_is_only_logged() {
        let profiles = StubProfiles::found("https://linkedin.com/in/jane").with_profile(
            "https://linkedin.com/in/jane",
            json!({ "company_linkedin_url": "https://linkedin.com/company/missing" }),
        );
        let services = Services {
            profiles: Arc::new(profiles),
            ..services_with(StubGenerator::new())
        };

        let update = ProfileFetch::new(&services).run(&state()).await.unwrap();

        assert!(update.organization.is_none());
        assert_eq!(update.errors.len(), 1);
        assert!(update.errors[0].starts_with("Company profile error"));
        assert!(update.profile_summary.is_some());
    }

    #[tokio::test]
    async fn test_profile_fetch_failure_fails_node() {
        let services = Services {
            profiles: Arc::new(StubProfiles::found("https://linkedin.com/in/unknown")),
            ..services_with(StubGenerator::new())
        };
        assert!(ProfileFetch::new(&services).run(&state()).await.is_err());
    }
}
