// Copyright 2025 Wissen Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::cancel::CancelFlag;
use crate::collector::auth::CredentialStore;
use crate::collector::ratelimit::DomainRateLimiter;
use crate::collector::{RawDocument, SourceCollector};
use crate::config::{WebConfig, WebDomain};
use crate::document::SourceType;
use crate::error::WissenError;

const USER_AGENT: &str = "Wissen Assistant 1.0";

/// Crawling collector for configured intranet domains.
///
/// Fetches are spaced by the shared per-domain rate limiter, carry an
/// explicit timeout, and the crawl is bounded by a page budget with a
/// visited-set so cyclic link graphs terminate.
pub struct WebCollector {
    client: reqwest::Client,
    limiter: Arc<DomainRateLimiter>,
    credentials: Arc<CredentialStore>,
    domains: Vec<WebDomain>,
    page_budget: usize,
    fetch_timeout: Duration,
}

impl WebCollector {
    pub fn new(
        config: &WebConfig,
        limiter: Arc<DomainRateLimiter>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            limiter,
            credentials,
            domains: config.domains.clone(),
            page_budget: config.page_budget,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }

    async fn crawl_domain(&self, domain: &WebDomain, cancel: &CancelFlag) -> Vec<RawDocument> {
        let root = match Url::parse(&format!("https://{}/", domain.host)) {
            Ok(url) => url,
            Err(e) => {
                warn!("invalid domain {}: {}", domain.host, e);
                return Vec::new();
            }
        };

        let mut queue: VecDeque<Url> = VecDeque::new();
        queue.push_back(root.clone());
        for seed in self.sitemap_seeds(&root).await {
            queue.push_back(seed);
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut pages = Vec::new();

        while let Some(url) = queue.pop_front() {
            if pages.len() >= self.page_budget {
                break;
            }
            if cancel.is_cancelled() {
                warn!("crawl of {} cancelled after {} pages", domain.host, pages.len());
                break;
            }
            if !visited.insert(url.as_str().to_string()) {
                continue;
            }

            let html = match self.fetch(&url, &domain.host).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("failed to fetch {}: {}", url, e);
                    continue;
                }
            };

            let page = parse_page(&url, &html.body);
            for link in &page.links {
                if !visited.contains(link.as_str()) && queue.len() < self.page_budget {
                    queue.push_back(link.clone());
                }
            }

            let mut extra = BTreeMap::new();
            extra.insert("domain".to_string(), domain.host.clone());
            extra.insert(
                "content_length".to_string(),
                page.text.len().to_string(),
            );

            pages.push(RawDocument {
                source_type: SourceType::Web,
                source_path: url.as_str().to_string(),
                title: page.title,
                text: if page.text.trim().is_empty() {
                    None
                } else {
                    Some(page.text)
                },
                last_modified: html.last_modified,
                extra,
            });
        }

        info!("crawled {} pages from {}", pages.len(), domain.host);
        pages
    }

    async fn fetch(&self, url: &Url, domain: &str) -> Result<FetchedPage> {
        self.limiter.acquire(domain).await;

        let mut request = self
            .client
            .get(url.as_str())
            .timeout(self.fetch_timeout)
            .header("User-Agent", USER_AGENT);
        for (name, value) in self.credentials.headers_for(domain) {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WissenError::SourceUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }

        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let body = response.text().await.context("failed to read body")?;
        Ok(FetchedPage {
            body,
            last_modified,
        })
    }

    /// Seed the crawl queue from robots.txt sitemap hints or the
    /// conventional /sitemap.xml location. Best-effort: failures just
    /// mean the crawl starts from the root page alone.
    async fn sitemap_seeds(&self, root: &Url) -> Vec<Url> {
        let host = match root.host_str() {
            Some(host) => host.to_string(),
            None => return Vec::new(),
        };

        let mut sitemap_urls = Vec::new();
        if let Ok(robots_url) = root.join("/robots.txt") {
            if let Ok(robots) = self.fetch(&robots_url, &host).await {
                for line in robots.body.lines() {
                    if let Some(value) = line.strip_prefix("Sitemap:") {
                        if let Ok(url) = Url::parse(value.trim()) {
                            sitemap_urls.push(url);
                        }
                    }
                }
            }
        }
        if sitemap_urls.is_empty() {
            if let Ok(url) = root.join("/sitemap.xml") {
                sitemap_urls.push(url);
            }
        }

        let mut seeds = Vec::new();
        for sitemap_url in sitemap_urls {
            if seeds.len() >= self.page_budget {
                break;
            }
            let body = match self.fetch(&sitemap_url, &host).await {
                Ok(page) => page.body,
                Err(_) => continue,
            };
            for loc in parse_sitemap_locations(&body) {
                if seeds.len() >= self.page_budget {
                    break;
                }
                if let Ok(url) = Url::parse(&loc) {
                    // Nested sitemap indexes are not followed; the
                    // page budget keeps the crawl bounded anyway.
                    if url.host_str() == Some(host.as_str()) && !loc.ends_with(".xml") {
                        seeds.push(url);
                    }
                }
            }
        }
        seeds
    }
}

#[async_trait]
impl SourceCollector for WebCollector {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn collect(&self, cancel: &CancelFlag) -> Vec<RawDocument> {
        let mut documents = Vec::new();
        for domain in &self.domains {
            if cancel.is_cancelled() {
                break;
            }
            if domain.authenticated && !self.credentials.is_valid(&domain.host) {
                warn!(
                    "no valid credentials for {}, skipping domain",
                    domain.host
                );
                continue;
            }
            documents.extend(self.crawl_domain(domain, cancel).await);
        }
        documents
    }
}

struct FetchedPage {
    body: String,
    last_modified: Option<DateTime<Utc>>,
}

struct ParsedPage {
    title: String,
    text: String,
    links: Vec<Url>,
}

/// Extract title, readable text, and same-domain outbound links from
/// one HTML page. Markup-to-text conversion drops script/style/nav
/// content along with the tags.
fn parse_page(url: &Url, html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").unwrap();
    let h1_selector = Selector::parse("h1").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    let title = document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            document
                .select(&h1_selector)
                .next()
                .map(|h| h.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| url.path().to_string());

    let text = html2text::from_read(html.as_bytes(), 120).unwrap_or_default();

    let mut links = Vec::new();
    let mut seen = HashSet::new();
    for element in document.select(&link_selector) {
        let href = match element.value().attr("href") {
            Some(href) => href,
            None => continue,
        };
        let resolved = match url.join(href) {
            Ok(mut resolved) => {
                resolved.set_fragment(None);
                resolved
            }
            Err(_) => continue,
        };
        if resolved.host_str() != url.host_str() {
            continue;
        }
        if seen.insert(resolved.as_str().to_string()) {
            links.push(resolved);
        }
    }

    ParsedPage { title, text, links }
}

/// Pull `<loc>` entries out of a sitemap document.
fn parse_sitemap_locations(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut locations = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"loc" => in_loc = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(decoded) = t.xml_content() {
                    if let Ok(text) = unescape(&decoded) {
                        locations.push(text.trim().to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    locations
}
