// SPDX-License-Identifier: MIT

//! External collaborators invoked by research nodes
//!
//! Each collaborator is a trait so that nodes can be exercised against
//! in-process doubles. The HTTP implementations live in the submodules:
//! - [search] - Serper web and news search
//! - [profile] - profile lookup through search plus the RapidAPI enrichment endpoint
//! - [page] - page fetching and text extraction
//! - [generator] - text generation backed by a [`Model`](crate::model::Model)
//! - [store] - Supabase persistence and an in-memory store

pub mod generator;
pub mod page;
pub mod profile;
pub mod search;
pub mod store;

pub use generator::{response_schema, ModelGenerator, UnconfiguredGenerator};
pub use page::{DiscoveredLinks, HttpScraper, ScrapedPage};
pub use profile::LinkedInProfiles;
pub use search::{NewsItem, SearchHit, SerperSearch};
pub use store::{MemoryStore, StoredOutreach, StoredRecords, StoredStatus, SupabaseStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{LeadflowError, ServiceError};
use crate::model::create_model;
use crate::workflow::state::{Document, Organization, OutreachArtifacts, ScoreDetail};

/// Finds and fetches professional profiles
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Profile URL for a person at an organization, if one can be found
    async fn find(&self, name: &str, organization: &str) -> Result<Option<String>, ServiceError>;

    /// Structured profile payload for a profile URL
    async fn fetch(&self, url: &str) -> Result<Value, ServiceError>;
}

/// Free-text and schema-constrained text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instructions: &str, content: &str) -> Result<String, ServiceError>;

    /// Generate a JSON value that follows `schema`
    async fn generate_structured(
        &self,
        instructions: &str,
        content: &str,
        schema: &Value,
    ) -> Result<Value, ServiceError>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, count: u32) -> Result<Vec<SearchHit>, ServiceError>;

    /// News about `subject` published within the last `days_back` days
    async fn recent_news(
        &self,
        subject: &str,
        count: u32,
        days_back: u32,
    ) -> Result<Vec<NewsItem>, ServiceError>;
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    /// Page text plus the structural links found on the page
    async fn fetch_as_text(&self, url: &str) -> Result<ScrapedPage, ServiceError>;
}

/// Final status written for a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    OutreachReady,
    NotQualified,
}

impl SubjectStatus {
    pub fn from_qualified(qualified: bool) -> Self {
        if qualified {
            Self::OutreachReady
        } else {
            Self::NotQualified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutreachReady => "outreach_ready",
            Self::NotQualified => "not_qualified",
        }
    }
}

/// Stores run results; every call is safe to repeat
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn upsert_organization(
        &self,
        subject_id: &str,
        organization: &Organization,
    ) -> Result<(), ServiceError>;

    async fn insert_documents(
        &self,
        subject_id: &str,
        owner_id: &str,
        documents: &[Document],
    ) -> Result<(), ServiceError>;

    async fn insert_outreach_artifacts(
        &self,
        subject_id: &str,
        owner_id: &str,
        artifacts: &OutreachArtifacts,
    ) -> Result<(), ServiceError>;

    async fn update_subject_status_and_score(
        &self,
        subject_id: &str,
        status: SubjectStatus,
        score: f64,
        detail: Option<&ScoreDetail>,
    ) -> Result<(), ServiceError>;
}

/// Collaborators plus the knobs nodes need from settings
#[derive(Clone)]
pub struct Services {
    pub profiles: Arc<dyn ProfileLookup>,
    pub generator: Arc<dyn TextGenerator>,
    pub search: Arc<dyn WebSearch>,
    pub scraper: Arc<dyn PageScraper>,
    pub store: Arc<dyn Persistence>,
    pub news_results: u32,
    pub news_days_back: u32,
}

impl Services {
    /// Build the HTTP-backed collaborators described by `settings`
    ///
    /// Persistence falls back to an in-memory store when Supabase is not configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, LeadflowError> {
        let model = create_model(&settings.model_provider, &settings.model_name)?;
        let generator = Arc::new(ModelGenerator::new(model, settings.llm_timeout()));
        Ok(Self::with_generator(settings, generator))
    }

    /// Collaborators for inspecting the workflow without model credentials
    ///
    /// Text generation fails with [`ServiceError::NotConfigured`].
    pub fn without_model(settings: &Settings) -> Self {
        Self::with_generator(settings, Arc::new(UnconfiguredGenerator))
    }

    fn with_generator(settings: &Settings, generator: Arc<dyn TextGenerator>) -> Self {
        let timeout = settings.request_timeout();

        let search: Arc<dyn WebSearch> =
            Arc::new(SerperSearch::new(settings.serper_api_key.clone(), timeout));
        let profiles = Arc::new(LinkedInProfiles::new(
            settings.rapidapi_key.clone(),
            Arc::clone(&search),
            timeout,
        ));
        let scraper = Arc::new(HttpScraper::new(settings.max_page_chars, timeout));

        let store: Arc<dyn Persistence> =
            match (&settings.supabase_url, &settings.supabase_service_key) {
                (Some(url), Some(key)) => Arc::new(SupabaseStore::new(url, key.clone(), timeout)),
                _ => {
                    log::warn!("Supabase is not configured; results are kept in memory only");
                    Arc::new(MemoryStore::new())
                }
            };

        Self {
            profiles,
            generator,
            search,
            scraper,
            store,
            news_results: settings.news_results,
            news_days_back: settings.news_days_back,
        }
    }
}

/// Bound a collaborator call; an elapsed timer becomes [`ServiceError::Timeout`]
pub async fn with_timeout<T, F>(service: &str, limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            service: service.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

/// Strip a surrounding markdown code fence (with an optional `json` tag)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let inner = &trimmed[start + 3..];
    let inner = match inner.find("```") {
        Some(end) => &inner[..end],
        None => inner,
    };
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    inner.trim()
}
