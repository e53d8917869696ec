// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::error::LeadflowError;
use crate::research::prompts;
use crate::services::{response_schema, PageScraper, Services, TextGenerator};
use crate::workflow::node::Node;
use crate::workflow::state::{Document, PartialUpdate, SocialLinks, WorkState};

pub const STEP: &str = "site_analysis";

static INSIGHTS_SCHEMA: OnceCell<Value> = OnceCell::new();

/// Structured judgment requested for the company website
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SiteInsights {
    /// About 300 words on mission, products and services
    pub summary: String,
    /// Main blog URL, or an empty string
    #[serde(default)]
    pub blog_url: String,
    #[serde(default)]
    pub youtube: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub facebook: String,
}

/// Absolute form of a link reported by the generator; empty means none
fn absolute(site: &Url, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    site.join(link).ok().map(|u| u.to_string())
}

/// Scrapes the company site and extracts its summary and social links
pub struct SiteAnalysis {
    scraper: Arc<dyn PageScraper>,
    generator: Arc<dyn TextGenerator>,
}

impl SiteAnalysis {
    pub fn new(services: &Services) -> Self {
        Self {
            scraper: Arc::clone(&services.scraper),
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for SiteAnalysis {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let mut update = PartialUpdate::step(STEP);

        let current = state.organization();
        let site = if current.site.is_empty() {
            state.subject().company_site.clone()
        } else {
            current.site.clone()
        };
        if site.is_empty() {
            update.site_analysis = Some("No website URL available.".to_string());
            return Ok(update.with_error("No company website to analyze"));
        }
        let site_url = Url::parse(&site)
            .map_err(|e| LeadflowError::other(format!("invalid website URL {}: {}", site, e)))?;

        let page = self.scraper.fetch_as_text(&site).await?;
        let schema = INSIGHTS_SCHEMA.get_or_try_init(response_schema::<SiteInsights>)?;
        let content = format!("Page address: {}\n\n{}", site, page.text);
        let raw = self
            .generator
            .generate_structured(prompts::SITE_ANALYSIS, &content, schema)
            .await?;
        let insights: SiteInsights = serde_json::from_value(raw)?;

        // Links found in the markup beat links recalled by the generator
        let found = page.links.social();
        let social = SocialLinks {
            blog: found.blog.or_else(|| absolute(&site_url, &insights.blog_url)),
            facebook: found
                .facebook
                .or_else(|| absolute(&site_url, &insights.facebook)),
            twitter: found.twitter.or_else(|| absolute(&site_url, &insights.twitter)),
            youtube: found.youtube.or_else(|| absolute(&site_url, &insights.youtube)),
        };

        let mut organization = current.clone();
        organization.site = site.clone();
        organization.social = social;
        if organization.profile_url.is_empty() {
            if let Some(profile) = page.links.linkedin {
                organization.profile_url = profile;
            }
        }

        update.organization = Some(organization);
        update.site_analysis = Some(insights.summary.clone());
        Ok(update.with_document(
            Document::markdown("site_analysis", "Website Analysis", insights.summary)
                .with_metadata("site", site),
        ))
    }
}
