// SPDX-License-Identifier: MIT

//! Digital presence branches and their join

use async_trait::async_trait;
use std::sync::Arc;

use super::or_missing;
use crate::error::LeadflowError;
use crate::research::prompts;
use crate::services::{NewsItem, PageScraper, Services, TextGenerator, WebSearch};
use crate::workflow::node::Node;
use crate::workflow::state::{Document, PartialUpdate, WorkState};

pub const CONTENT_STEP: &str = "content_analysis";
pub const SOCIAL_STEP: &str = "social_media_analysis";
pub const NEWS_STEP: &str = "news_analysis";
pub const PRESENCE_STEP: &str = "digital_presence_report";

fn company_name(state: &WorkState) -> &str {
    let org = &state.organization().name;
    if org.is_empty() {
        &state.subject().company_name
    } else {
        org
    }
}

/// Reviews the company blog
pub struct ContentAnalysis {
    scraper: Arc<dyn PageScraper>,
    generator: Arc<dyn TextGenerator>,
}

impl ContentAnalysis {
    pub fn new(services: &Services) -> Self {
        Self {
            scraper: Arc::clone(&services.scraper),
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for ContentAnalysis {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let mut update = PartialUpdate::completed(CONTENT_STEP);

        let Some(blog) = state.organization().social.blog.clone() else {
            update.content_analysis = Some("No blog URL found.".to_string());
            return Ok(update);
        };

        let page = self.scraper.fetch_as_text(&blog).await?;
        let name = match company_name(state) {
            "" => "the company",
            n => n,
        };
        let instructions = format!("{}\n\nCompany: {}", prompts::BLOG_ANALYSIS, name);
        let analysis = self.generator.generate(&instructions, &page.text).await?;

        update.content_analysis = Some(analysis.clone());
        Ok(update.with_document(
            Document::markdown("content_analysis", "Blog Content Analysis", analysis)
                .with_metadata("blog_url", blog),
        ))
    }
}

/// Lists the social profiles found on the site
pub struct SocialAnalysis;

#[async_trait]
impl Node for SocialAnalysis {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let mut update = PartialUpdate::completed(SOCIAL_STEP);
        let social = &state.organization().social;

        let profiles = social.profiles();
        if profiles.is_empty() {
            update.social_summary = Some("No social media profiles found.".to_string());
            return Ok(update);
        }

        let list = profiles
            .iter()
            .map(|(platform, url)| format!("- **{}**: {}", platform, url))
            .collect::<Vec<_>>()
            .join("\n");
        let summary = format!(
            "## Social Media Presence\n\nFound profiles:\n{}\n\n*Engagement metrics need platform API access.*",
            list
        );

        update.social_summary = Some(summary.clone());
        Ok(update.with_document(
            Document::markdown("social_analysis", "Social Media Analysis", summary)
                .with_metadata("social_links", serde_json::to_value(social)?),
        ))
    }
}

/// Summarizes recent news about the company
pub struct NewsAnalysis {
    search: Arc<dyn WebSearch>,
    generator: Arc<dyn TextGenerator>,
    count: u32,
    days_back: u32,
}

impl NewsAnalysis {
    pub fn new(services: &Services) -> Self {
        Self {
            search: Arc::clone(&services.search),
            generator: Arc::clone(&services.generator),
            count: services.news_results,
            days_back: services.news_days_back,
        }
    }
}

fn format_news(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(|n| format!("**{}**\n{}\nDate: {}\nURL: {}\n", n.title, n.snippet, n.date, n.link))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Node for NewsAnalysis {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let mut update = PartialUpdate::completed(NEWS_STEP);

        let name = company_name(state).to_string();
        if name.is_empty() {
            update.news_summary = Some("No company name for news search.".to_string());
            return Ok(update);
        }

        let items = self
            .search
            .recent_news(&name, self.count, self.days_back)
            .await?;
        if items.is_empty() {
            update.news_summary = Some("No recent news found.".to_string());
            return Ok(update);
        }

        let instructions = format!("{}\n\nCompany: {}", prompts::NEWS_SUMMARY, name);
        let summary = self
            .generator
            .generate(&instructions, &format_news(&items))
            .await?;

        update.news_summary = Some(summary.clone());
        Ok(update.with_document(
            Document::markdown("news_analysis", "Recent News Analysis", summary)
                .with_metadata("company_name", name)
                .with_metadata("articles", items.len()),
        ))
    }
}

/// Joins the three presence branches into one report
pub struct PresenceReport {
    generator: Arc<dyn TextGenerator>,
}

impl PresenceReport {
    pub fn new(services: &Services) -> Self {
        Self {
            generator: Arc::clone(&services.generator),
        }
    }
}

#[async_trait]
impl Node for PresenceReport {
    async fn run(&self, state: &WorkState) -> Result<PartialUpdate, LeadflowError> {
        let name = match company_name(state) {
            "" => "Unknown",
            n => n,
        };
        let input = format!(
            "# Company: {}\n\n## Website Analysis\n{}\n\n## Blog Analysis\n{}\n\n## Social Media Analysis\n{}\n\n## Recent News\n{}",
            name,
            or_missing(state.site_analysis()),
            or_missing(state.content_analysis()),
            or_missing(state.social_summary()),
            or_missing(state.news_summary()),
        );
        let report = self
            .generator
            .generate(prompts::DIGITAL_PRESENCE, &input)
            .await?;

        Ok(PartialUpdate {
            presence_report: Some(report.clone()),
            ..PartialUpdate::step(PRESENCE_STEP)
        }
        .with_document(
            Document::markdown("presence_report", "Digital Presence Report", report)
                .with_metadata("company_name", name),
        ))
    }
}
