// SPDX-License-Identifier: MIT

//! Persistence backends
//!
//! `SupabaseStore` writes through the PostgREST API; `MemoryStore` keeps
//! everything in process and is used when no database is configured.

use super::{with_timeout, Persistence, SubjectStatus};
use crate::error::ServiceError;
use crate::workflow::state::{Document, Organization, OutreachArtifacts, ScoreDetail};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

const SERVICE: &str = "supabase";
/// Unique key of a `reports` row; repeated inserts update it in place
const DOCUMENT_KEY: &str = "lead_id,report_type,title";
/// Unique key of an `outreach_materials` row
const OUTREACH_KEY: &str = "lead_id,material_type";

/// Final status and score recorded for a subject
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredStatus {
    pub status: SubjectStatus,
    pub score: f64,
    pub detail: Option<ScoreDetail>,
}

/// One outreach row: an email or an interview script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredOutreach {
    pub subject_id: String,
    pub owner_id: String,
    pub material_type: String,
    pub subject: Option<String>,
    pub content: String,
}

/// Everything a [`MemoryStore`] has recorded
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoredRecords {
    pub statuses: HashMap<String, StoredStatus>,
    pub organizations: HashMap<String, Organization>,
    /// (subject id, owner id, document)
    pub documents: Vec<(String, String, Document)>,
    pub outreach: Vec<StoredOutreach>,
}

/// Email and script rows for an outreach record; empty parts produce no row
fn outreach_rows(subject_id: &str, owner_id: &str, artifacts: &OutreachArtifacts) -> Vec<StoredOutreach> {
    let mut rows = Vec::new();
    if let Some(body) = artifacts.body.as_deref().filter(|b| !b.is_empty()) {
        rows.push(StoredOutreach {
            subject_id: subject_id.to_string(),
            owner_id: owner_id.to_string(),
            material_type: "email".to_string(),
            subject: artifacts.subject.clone(),
            content: body.to_string(),
        });
    }
    if let Some(script) = artifacts.script.as_deref().filter(|s| !s.is_empty()) {
        rows.push(StoredOutreach {
            subject_id: subject_id.to_string(),
            owner_id: owner_id.to_string(),
            material_type: "interview_script".to_string(),
            subject: None,
            content: script.to_string(),
        });
    }
    rows
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<StoredRecords>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything stored so far
    pub async fn records(&self) -> StoredRecords {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn upsert_organization(
        &self,
        subject_id: &str,
        organization: &Organization,
    ) -> Result<(), ServiceError> {
        self.records
            .write()
            .await
            .organizations
            .insert(subject_id.to_string(), organization.clone());
        Ok(())
    }

    async fn insert_documents(
        &self,
        subject_id: &str,
        owner_id: &str,
        documents: &[Document],
    ) -> Result<(), ServiceError> {
        let mut records = self.records.write().await;
        for document in documents {
            let row = (subject_id.to_string(), owner_id.to_string(), document.clone());
            let existing = records.documents.iter_mut().find(|(id, _, d)| {
                id == subject_id && d.kind() == document.kind() && d.title() == document.title()
            });
            match existing {
                Some(slot) => *slot = row,
                None => records.documents.push(row),
            }
        }
        Ok(())
    }

    async fn insert_outreach_artifacts(
        &self,
        subject_id: &str,
        owner_id: &str,
        artifacts: &OutreachArtifacts,
    ) -> Result<(), ServiceError> {
        let mut records = self.records.write().await;
        for row in outreach_rows(subject_id, owner_id, artifacts) {
            let existing = records
                .outreach
                .iter_mut()
                .find(|r| r.subject_id == row.subject_id && r.material_type == row.material_type);
            match existing {
                Some(slot) => *slot = row,
                None => records.outreach.push(row),
            }
        }
        Ok(())
    }

    async fn update_subject_status_and_score(
        &self,
        subject_id: &str,
        status: SubjectStatus,
        score: f64,
        detail: Option<&ScoreDetail>,
    ) -> Result<(), ServiceError> {
        self.records.write().await.statuses.insert(
            subject_id.to_string(),
            StoredStatus {
                status,
                score,
                detail: detail.cloned(),
            },
        );
        Ok(())
    }
}

/// Supabase (PostgREST) store
///
/// Tables: `leads`, `company_data` (one row per lead), `reports` and
/// `outreach_materials`.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_key: String,
    timeout: Duration,
}

impl SupabaseStore {
    pub fn new(url: &str, service_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            service_key,
            timeout,
        }
    }

    async fn send(
        &self,
        method: Method,
        table: &str,
        query: &[(&str, &str)],
        prefer: &str,
        body: &Value,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/{}", self.base_url, table);
        log::debug!("Supabase {} {}", method, url);

        with_timeout(SERVICE, self.timeout, async {
            let resp = self
                .client
                .request(method.clone(), &url)
                .query(query)
                .header("apikey", &self.service_key)
                .header("Authorization", format!("Bearer {}", self.service_key))
                .header("Content-Type", "application/json")
                .header("Prefer", prefer)
                .json(body)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let text = resp.text().await?;
                return Err(ServiceError::status(SERVICE, status, text));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Persistence for SupabaseStore {
    async fn upsert_organization(
        &self,
        subject_id: &str,
        organization: &Organization,
    ) -> Result<(), ServiceError> {
        let social = &organization.social;
        let row = json!({
            "lead_id": subject_id,
            "name": organization.name,
            "profile": organization.description,
            "website": organization.site,
            "linkedin_url": organization.profile_url,
            "blog_url": social.blog.as_deref().unwrap_or(""),
            "facebook_url": social.facebook.as_deref().unwrap_or(""),
            "twitter_url": social.twitter.as_deref().unwrap_or(""),
            "youtube_url": social.youtube.as_deref().unwrap_or(""),
        });
        self.send(
            Method::POST,
            "company_data",
            &[("on_conflict", "lead_id")],
            "resolution=merge-duplicates,return=minimal",
            &row,
        )
        .await
    }

    async fn insert_documents(
        &self,
        subject_id: &str,
        owner_id: &str,
        documents: &[Document],
    ) -> Result<(), ServiceError> {
        if documents.is_empty() {
            return Ok(());
        }
        let rows: Vec<Value> = documents
            .iter()
            .map(|d| {
                json!({
                    "lead_id": subject_id,
                    "user_id": owner_id,
                    "report_type": d.kind(),
                    "title": d.title(),
                    "content": d.content(),
                    "is_markdown": d.is_markup(),
                    "metadata": d.metadata(),
                })
            })
            .collect();
        self.send(
            Method::POST,
            "reports",
            &[("on_conflict", DOCUMENT_KEY)],
            "resolution=merge-duplicates,return=minimal",
            &Value::Array(rows),
        )
        .await
    }

    async fn insert_outreach_artifacts(
        &self,
        subject_id: &str,
        owner_id: &str,
        artifacts: &OutreachArtifacts,
    ) -> Result<(), ServiceError> {
        let rows: Vec<Value> = outreach_rows(subject_id, owner_id, artifacts)
            .into_iter()
            .map(|r| {
                json!({
                    "lead_id": r.subject_id,
                    "user_id": r.owner_id,
                    "material_type": r.material_type,
                    "subject": r.subject,
                    "content": r.content,
                })
            })
            .collect();
        if rows.is_empty() {
            return Ok(());
        }
        self.send(
            Method::POST,
            "outreach_materials",
            &[("on_conflict", OUTREACH_KEY)],
            "resolution=merge-duplicates,return=minimal",
            &Value::Array(rows),
        )
        .await
    }

    async fn update_subject_status_and_score(
        &self,
        subject_id: &str,
        status: SubjectStatus,
        score: f64,
        detail: Option<&ScoreDetail>,
    ) -> Result<(), ServiceError> {
        let id_filter = format!("eq.{}", subject_id);
        let body = json!({
            "status": status.as_str(),
            "score": score,
            "score_details": detail,
        });
        self.send(
            Method::PATCH,
            "leads",
            &[("id", id_filter.as_str())],
            "return=minimal",
            &body,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn artifacts() -> OutreachArtifacts {
        OutreachArtifacts::default()
            .with_report("report")
            .with_email("Hello", "Body")
            .with_script("Script")
    }

    #[test]
    fn test_outreach_rows_skip_missing_parts() {
        let rows = outreach_rows("lead-1", "owner-1", &OutreachArtifacts::default().with_report("r"));
        assert!(rows.is_empty());

        let rows = outreach_rows("lead-1", "owner-1", &artifacts());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].material_type, "email");
        assert_eq!(rows[0].subject.as_deref(), Some("Hello"));
        assert_eq!(rows[1].material_type, "interview_script");
    }

    #[tokio::test]
    async fn test_memory_store_records_everything() {
        let store = MemoryStore::new();
        let org = Organization {
            name: "Acme".to_string(),
            ..Default::default()
        };

        store.upsert_organization("lead-1", &org).await.unwrap();
        store.upsert_organization("lead-1", &org).await.unwrap();
        store
            .insert_documents("lead-1", "owner-1", &[Document::markdown("k", "t", "c")])
            .await
            .unwrap();
        store
            .insert_outreach_artifacts("lead-1", "owner-1", &artifacts())
            .await
            .unwrap();
        store
            .update_subject_status_and_score("lead-1", SubjectStatus::OutreachReady, 7.2, None)
            .await
            .unwrap();

        let records = store.records().await;
        assert_eq!(records.organizations.len(), 1);
        assert_eq!(records.documents.len(), 1);
        assert_eq!(records.outreach.len(), 2);
        assert_eq!(records.statuses["lead-1"].status, SubjectStatus::OutreachReady);
        assert_eq!(records.statuses["lead-1"].score, 7.2);
    }

    #[tokio::test]
    async fn test_supabase_status_update() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/leads"))
            .and(query_param("id", "eq.lead-1"))
            .and(header("apikey", "service-key"))
            .and(header("Authorization", "Bearer service-key"))
            .and(body_json(json!({
                "status": "not_qualified",
                "score": 4.5,
                "score_details": null
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&server.uri(), "service-key".to_string(), Duration::from_secs(5));
        store
            .update_subject_status_and_score("lead-1", SubjectStatus::NotQualified, 4.5, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_supabase_upsert_uses_conflict_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/company_data"))
            .and(query_param("on_conflict", "lead_id"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&server.uri(), "service-key".to_string(), Duration::from_secs(5));
        store
            .upsert_organization("lead-1", &Organization::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_supabase_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/reports"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&server.uri(), "bad".to_string(), Duration::from_secs(5));
        let err = store
            .insert_documents("lead-1", "owner-1", &[Document::markdown("k", "t", "c")])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 401, ref body, .. } if body == "invalid key"));
    }

    #[tokio::test]
    async fn test_memory_store_repeated_calls_replace_rows() {
        let store = MemoryStore::new();
        let docs = [
            Document::markdown("site_analysis", "Website Analysis", "first"),
            Document::markdown("news_analysis", "Recent News Analysis", "news"),
        ];
        store.insert_documents("lead-1", "owner", &docs).await.unwrap();
        store
            .insert_documents(
                "lead-1",
                "owner",
                &[Document::markdown("site_analysis", "Website Analysis", "second")],
            )
            .await
            .unwrap();
        store.insert_documents("lead-2", "owner", &docs[..1]).await.unwrap();
        store
            .insert_outreach_artifacts("lead-1", "owner", &artifacts())
            .await
            .unwrap();
        store
            .insert_outreach_artifacts(
                "lead-1",
                "owner",
                &OutreachArtifacts::default().with_email("Hello again", "Body 2"),
            )
            .await
            .unwrap();

        let records = store.records().await;
        assert_eq!(records.documents.len(), 3);
        assert_eq!(records.documents[0].2.content(), "second");
        assert_eq!(records.documents[2].0, "lead-2");
        assert_eq!(records.outreach.len(), 2);
        assert_eq!(records.outreach[0].content, "Body 2");
        assert_eq!(records.outreach[0].subject.as_deref(), Some("Hello again"));
        assert_eq!(records.outreach[1].material_type, "interview_script");
    }

    fn merges_duplicates(request: &Request) -> bool {
        request
            .headers
            .get("Prefer")
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.contains("resolution=merge-duplicates"))
    }

    #[tokio::test]
    async fn test_supabase_inserts_merge_on_row_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/reports"))
            .and(query_param("on_conflict", "lead_id,report_type,title"))
            .and(merges_duplicates)
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/outreach_materials"))
            .and(query_param("on_conflict", "lead_id,material_type"))
            .and(merges_duplicates)
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&server.uri(), "service-key".to_string(), Duration::from_secs(5));
        let docs = [Document::markdown("k", "t", "c")];
        store.insert_documents("lead-1", "owner-1", &docs).await.unwrap();
        store.insert_documents("lead-1", "owner-1", &docs).await.unwrap();
        store
            .insert_outreach_artifacts("lead-1", "owner-1", &artifacts())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_supabase_skips_empty_batches() {
        // No server: an empty batch must not issue a request
        let store = SupabaseStore::new("http://127.0.0.1:9", "key".to_string(), Duration::from_secs(1));
        store.insert_documents("lead-1", "owner-1", &[]).await.unwrap();
        store
            .insert_outreach_artifacts("lead-1", "owner-1", &OutreachArtifacts::default())
            .await
            .unwrap();
    }
}
