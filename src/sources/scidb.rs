//! SciDB source (Anna's Archive): one fixed endpoint, DOIs only.
//!
//! The endpoint page for a DOI embeds the PDF; the link is found with the
//! generic HTML heuristics. There is no mirror state and no retry: every
//! call is a single attempt, so one instance can serve many concurrent
//! tasks over the shared connection pool.

use async_trait::async_trait;

use crate::config::SciDbConfig;
use crate::models::{FetchResult, Identifier, ResolvedLink};
use crate::sources::{absolutize, Source, SourceError};
use crate::utils::{find_pdf_url, generate_name, HttpClient};

/// SciDB single-endpoint source
#[derive(Debug, Clone)]
pub struct SciDbSource {
    client: HttpClient,
    base_url: String,
}

impl SciDbSource {
    pub fn new(client: HttpClient, config: &SciDbConfig) -> Self {
        Self::with_base_url(client, &config.base_url)
    }

    /// Use a different endpoint; the identifier is appended verbatim
    pub fn with_base_url(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    fn page_url(&self, identifier: &Identifier) -> String {
        format!("{}{}", self.base_url, identifier)
    }
}

#[async_trait]
impl Source for SciDbSource {
    fn id(&self) -> &str {
        "scidb"
    }

    fn name(&self) -> &str {
        "SciDB"
    }

    #[tracing::instrument(skip_all, fields(identifier = %identifier))]
    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedLink, SourceError> {
        if !identifier.matches_doi_pattern() {
            return Err(SourceError::SourceNotFound(format!(
                "{} (SciDB only accepts DOIs)",
                identifier
            )));
        }

        let page_url = self.page_url(identifier);
        let response = self.client.get(&page_url).send().await?;
        let html = response.text().await?;

        match find_pdf_url(&html) {
            Some(link) => {
                let url = absolutize(&link, &page_url);
                tracing::info!("Found potential source at {}", url);
                Ok(ResolvedLink::new(url, identifier.clone()))
            }
            None => Err(SourceError::SourceNotFound(identifier.to_string())),
        }
    }

    #[tracing::instrument(skip_all, fields(identifier = %identifier))]
    async fn fetch(&self, identifier: &Identifier) -> Result<FetchResult, SourceError> {
        let link = self.resolve(identifier).await?;

        let response = self.client.get(&link.url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::SourceNotFound(format!(
                "{} ({} returned status {})",
                identifier,
                link.url,
                response.status()
            )));
        }

        let response_url = response.url().to_string();
        let bytes = response.bytes().await?.to_vec();
        let generated_name = generate_name(&response_url, &bytes);

        Ok(FetchResult {
            bytes,
            source_url: link.url,
            generated_name,
        })
    }
}
