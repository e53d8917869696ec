// SPDX-License-Identifier: MIT

//! Page fetching and text extraction

use super::{with_timeout, PageScraper};
use crate::error::ServiceError;
use crate::workflow::state::SocialLinks;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use std::time::Duration;
use url::Url;

const SERVICE: &str = "page fetch";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";
const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// Structural links found on a page, resolved to absolute URLs
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DiscoveredLinks {
    pub blog: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub youtube: Option<String>,
    pub linkedin: Option<String>,
}

impl DiscoveredLinks {
    /// Record `link` under its platform unless that platform already has one
    fn classify(&mut self, link: &Url) {
        let host = link.host_str().unwrap_or("").trim_start_matches("www.");
        let path = link.path().to_lowercase();

        let slot = if host == "facebook.com" || host.ends_with(".facebook.com") {
            &mut self.facebook
        } else if host == "twitter.com" || host == "x.com" {
            &mut self.twitter
        } else if host == "youtube.com" || host == "youtu.be" || host.ends_with(".youtube.com") {
            &mut self.youtube
        } else if host.ends_with("linkedin.com") && path.starts_with("/company") {
            &mut self.linkedin
        } else if host.starts_with("blog.") || path.starts_with("/blog") || path.starts_with("/news") {
            &mut self.blog
        } else {
            return;
        };

        if slot.is_none() {
            *slot = Some(link.to_string());
        }
    }

    pub fn social(&self) -> SocialLinks {
        SocialLinks {
            blog: self.blog.clone(),
            facebook: self.facebook.clone(),
            twitter: self.twitter.clone(),
            youtube: self.youtube.clone(),
        }
    }
}

/// Text content of a fetched page
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    pub truncated: bool,
    pub links: DiscoveredLinks,
}

pub struct HttpScraper {
    client: Client,
    max_chars: usize,
    timeout: Duration,
}

impl HttpScraper {
    pub fn new(max_chars: usize, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            max_chars,
            timeout,
        }
    }

    async fn download(&self, url: &str) -> Result<String, ServiceError> {
        with_timeout(SERVICE, self.timeout, async {
            let resp = self
                .client
                .get(url)
                .header("User-Agent", USER_AGENT)
                .header(
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header("Accept-Language", "en-US,en;q=0.9")
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                return Err(ServiceError::status(SERVICE, status, url));
            }

            Ok(resp.text().await?)
        })
        .await
    }
}

#[async_trait]
impl PageScraper for HttpScraper {
    async fn fetch_as_text(&self, url: &str) -> Result<ScrapedPage, ServiceError> {
        let base = Url::parse(url)
            .map_err(|e| ServiceError::InvalidResponse(format!("invalid URL {}: {}", url, e)))?;
        let html = self.download(url).await?;
        let page = extract_page(&base, &html, self.max_chars)?;

        log::debug!(
            "Scraped {} ({} chars, truncated: {})",
            url,
            page.text.len(),
            page.truncated
        );
        Ok(page)
    }
}

fn selector(css: &str) -> Result<Selector, ServiceError> {
    Selector::parse(css)
        .map_err(|e| ServiceError::InvalidResponse(format!("bad selector {}: {:?}", css, e)))
}

/// Parse a page into text and links
///
/// Links are collected from the full document before the text is cut to
/// `max_chars`.
pub fn extract_page(base: &Url, html: &str, max_chars: usize) -> Result<ScrapedPage, ServiceError> {
    let doc = Html::parse_document(html);

    let mut links = DiscoveredLinks::default();
    for anchor in doc.select(&selector("a[href]")?) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Ok(link) = base.join(href.trim()) {
            if matches!(link.scheme(), "http" | "https") {
                links.classify(&link);
            }
        }
    }

    let title = doc
        .select(&selector("title")?)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let root = match doc.select(&selector("body")?).next() {
        Some(body) => body,
        None => doc.root_element(),
    };

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| SKIPPED_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }

    let (text, truncated) = truncate(&lines.join("\n"), max_chars);

    Ok(ScrapedPage {
        url: base.to_string(),
        title,
        text,
        truncated,
        links,
    })
}

/// Cut `text` to at most `max_chars` characters, marking the cut
pub fn truncate(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER), true),
        None => (text.to_string(), false),
    }
}
