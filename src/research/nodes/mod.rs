// SPDX-License-Identifier: MIT

//! Research node implementations
//!
//! Each node holds the collaborators it needs, cloned out of [`Services`](crate::services::Services)
//! when the graph is built.

mod outreach;
mod persist;
mod presence;
mod profile;
mod report;
mod scoring;
mod site;

pub use outreach::{EmailDraft, InterviewScript, OutreachReport};
pub use persist::Persist;
pub use presence::{ContentAnalysis, NewsAnalysis, PresenceReport, SocialAnalysis};
pub use profile::ProfileFetch;
pub use report::ConsolidatedReport;
pub use scoring::{Scoring, QUALIFICATION_THRESHOLD};
pub use site::{SiteAnalysis, SiteInsights};

/// Section text, or a marker the generator is told to treat as missing data
fn or_missing(section: Option<&str>) -> &str {
    match section {
        Some(text) if !text.trim().is_empty() => text,
        _ => "Not available",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process collaborator doubles shared by the node tests

    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::error::ServiceError;
    use crate::services::{
        strip_code_fences, DiscoveredLinks, MemoryStore, NewsItem, PageScraper, ProfileLookup,
        ScrapedPage, SearchHit, Services, TextGenerator, WebSearch,
    };
    use crate::workflow::state::{Seed, WorkState};

    pub fn state() -> WorkState {
        WorkState::from_seed(
            Seed {
                id: "lead-1".to_string(),
                name: "Jane Doe".to_string(),
                email: "jane@acme.test".to_string(),
                company_name: "Acme".to_string(),
                company_website: "https://acme.test".to_string(),
                ..Default::default()
            },
            "owner-1",
        )
        .unwrap()
    }

    pub fn page(text: &str, links: DiscoveredLinks) -> ScrapedPage {
        ScrapedPage {
            text: text.to_string(),
            links,
            ..Default::default()
        }
    }

    /// Default stubs around `generator`; persistence goes to a fresh memory store
    pub fn services_with(generator: StubGenerator) -> Services {
        Services {
            profiles: Arc::new(StubProfiles::absent()),
            generator: Arc::new(generator),
            search: Arc::new(StubSearch::default()),
            scraper: Arc::new(StubScraper::new()),
            store: Arc::new(MemoryStore::new()),
            news_results: 5,
            news_days_back: 30,
        }
    }

    /// Replies keyed by the prompt the instructions start with
    #[derive(Default)]
    pub struct StubGenerator {
        replies: Vec<(&'static str, String)>,
        failing: Vec<&'static str>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(mut self, prompt: &'static str, text: impl Into<String>) -> Self {
            self.replies.push((prompt, text.into()));
            self
        }

        pub fn fail(mut self, prompt: &'static str) -> Self {
            self.failing.push(prompt);
            self
        }

        pub fn last_content(&self) -> Option<String> {
            self.calls.lock().unwrap().last().map(|(_, c)| c.clone())
        }

        fn answer(&self, instructions: &str, content: &str) -> Result<String, ServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push((instructions.to_string(), content.to_string()));
            if self.failing.iter().any(|p| instructions.starts_with(p)) {
                return Err(ServiceError::Timeout {
                    service: "text generation".to_string(),
                    secs: 120,
                });
            }
            Ok(self
                .replies
                .iter()
                .find(|(p, _)| instructions.starts_with(p))
                .map(|(_, text)| text.clone())
                .unwrap_or_else(|| "generated text".to_string()))
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, instructions: &str, content: &str) -> Result<String, ServiceError> {
            self.answer(instructions, content)
        }

        async fn generate_structured(
            &self,
            instructions: &str,
            content: &str,
            _schema: &Value,
        ) -> Result<Value, ServiceError> {
            let text = self.answer(instructions, content)?;
            Ok(serde_json::from_str(strip_code_fences(&text))?)
        }
    }

    /// Pages keyed by URL; unknown URLs answer 404
    #[derive(Default)]
    pub struct StubScraper {
        pages: HashMap<String, ScrapedPage>,
    }

    impl StubScraper {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, page: ScrapedPage) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }
    }

    #[async_trait]
    impl PageScraper for StubScraper {
        async fn fetch_as_text(&self, url: &str) -> Result<ScrapedPage, ServiceError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ServiceError::status("page fetch", 404, url))
        }
    }

    #[derive(Default)]
    pub struct StubSearch {
        news: Vec<NewsItem>,
        fail: bool,
    }

    impl StubSearch {
        pub fn with_news(news: Vec<NewsItem>) -> Self {
            Self {
                news,
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl WebSearch for StubSearch {
        async fn search(&self, _query: &str, _count: u32) -> Result<Vec<SearchHit>, ServiceError> {
            if self.fail {
                return Err(ServiceError::status("serper", 500, "down"));
            }
            Ok(Vec::new())
        }

        async fn recent_news(
            &self,
            _subject: &str,
            _count: u32,
            _days_back: u32,
        ) -> Result<Vec<NewsItem>, ServiceError> {
            if self.fail {
                return Err(ServiceError::status("serper", 500, "down"));
            }
            Ok(self.news.clone())
        }
    }

    /// Profile lookup with a fixed search result and canned payloads
    #[derive(Default)]
    pub struct StubProfiles {
        found: Option<String>,
        payloads: HashMap<String, Value>,
    }

    impl StubProfiles {
        pub fn absent() -> Self {
            Self::default()
        }

        pub fn found(url: &str) -> Self {
            Self {
                found: Some(url.to_string()),
                ..Default::default()
            }
        }

        pub fn with_profile(mut self, url: &str, payload: Value) -> Self {
            self.payloads.insert(url.to_string(), payload);
            self
        }
    }

    #[async_trait]
    impl ProfileLookup for StubProfiles {
        async fn find(&self, _name: &str, _organization: &str) -> Result<Option<String>, ServiceError> {
            Ok(self.found.clone())
        }

        async fn fetch(&self, url: &str) -> Result<Value, ServiceError> {
            self.payloads
                .get(url)
                .cloned()
                .ok_or_else(|| ServiceError::status("profile enrichment", 404, url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_missing() {
        assert_eq!(or_missing(Some("text")), "text");
        assert_eq!(or_missing(Some("  ")), "Not available");
        assert_eq!(or_missing(None), "Not available");
    }
}
