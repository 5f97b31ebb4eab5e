//! Sci-Hub source: mirror discovery, iframe scraping and mirror rotation.
//!
//! Sci-Hub mirrors come and go, and any of them may answer with a captcha
//! page instead of the PDF. A session therefore keeps an ordered list of
//! mirrors, drops the current one whenever it misbehaves and retries the
//! whole fetch with a random wait between attempts. Once the list is empty
//! the session fails for good.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::SciHubConfig;
use crate::models::{FetchResult, Identifier, IdentifierKind, ResolvedLink};
use crate::sources::{
    absolutize, discover_mirrors, MirrorList, SessionObserver, Source, SourceError,
    TracingObserver,
};
use crate::utils::{find_iframe_src, generate_name, with_retry, HttpClient, RetryConfig};

/// A Sci-Hub download session.
///
/// The session exclusively owns its mirror list. Rotations happen under a
/// lock and never span an await point, so dropping an in-flight fetch leaves
/// the list consistent.
#[derive(Debug)]
pub struct SciHubSource {
    client: HttpClient,
    mirrors: Mutex<MirrorList>,
    retry: RetryConfig,
    observer: Arc<dyn SessionObserver>,
}

impl SciHubSource {
    /// Start a session using the configured mirrors, or discovered ones if none are configured
    pub async fn connect(client: HttpClient, config: &SciHubConfig) -> Result<Self, SourceError> {
        let mirrors = if config.mirrors.is_empty() {
            discover_mirrors(&client, &config.discovery_url).await?
        } else {
            config.mirrors.clone()
        };

        Ok(Self::with_mirrors(client, mirrors)?.retry_config(config.retry_config()))
    }

    /// Start a session with a fixed mirror list
    pub fn with_mirrors<I, S>(client: HttpClient, mirrors: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mirrors = MirrorList::new(mirrors);
        if mirrors.is_empty() {
            tracing::error!("No Sci-Hub mirrors to start a session with");
            return Err(SourceError::NoMirrorsAvailable);
        }

        Ok(Self {
            client,
            mirrors: Mutex::new(mirrors),
            retry: SciHubConfig::default().retry_config(),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Override the retry policy
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Report session events to `observer` instead of plain tracing
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The mirror currently in use
    pub fn current_mirror(&self) -> Result<String, SourceError> {
        self.lock_mirrors().current().map(str::to_string)
    }

    /// Remaining mirrors, current first
    pub fn mirrors(&self) -> Vec<String> {
        self.lock_mirrors().iter().map(str::to_string).collect()
    }

    fn lock_mirrors(&self) -> MutexGuard<'_, MirrorList> {
        // Rotation cannot leave the list half-updated, so a poisoned lock is still usable.
        self.mirrors.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop the current mirror and move to the next one
    fn rotate_mirror(&self) -> Result<String, SourceError> {
        let mut mirrors = self.lock_mirrors();
        let from = mirrors.current().map(str::to_string).unwrap_or_default();
        let next = mirrors.rotate().map(str::to_string);
        drop(mirrors);

        self.observer.mirror_rotated(&from, next.as_deref().ok());
        next
    }

    /// Find the direct PDF link for an identifier.
    ///
    /// Direct URLs are returned untouched without any request. Anything
    /// else is looked up on the current mirror; a page without an iframe
    /// moves the session to the next mirror. At most one request is made per
    /// mirror known when the lookup starts.
    async fn direct_url(&self, identifier: &Identifier) -> Result<String, SourceError> {
        if identifier.kind() == IdentifierKind::DirectUrl {
            return Ok(identifier.as_str().to_string());
        }

        let candidates = self.lock_mirrors().len();
        for _ in 0..candidates {
            let mirror = self.current_mirror()?;
            let page_url = format!("{}/{}", mirror, identifier);

            let response = self.client.get(&page_url).send().await?;
            let html = response.text().await?;

            if let Some(src) = find_iframe_src(&html) {
                return Ok(absolutize(&src, &page_url));
            }

            tracing::info!("No embedded paper on {}", page_url);
            if self.rotate_mirror().is_err() {
                break;
            }
        }

        Err(SourceError::IdentifierNotFound(identifier.to_string()))
    }

    /// One fetch attempt. Retryable failures rotate the mirror first; if
    /// that exhausts the list the failure becomes terminal.
    async fn fetch_attempt(
        &self,
        identifier: &Identifier,
        attempt: u32,
    ) -> Result<FetchResult, SourceError> {
        let result = self.fetch_once(identifier).await;

        let error = match result {
            Ok(fetched) => return Ok(fetched),
            Err(error) => error,
        };
        self.observer.attempt_failed(identifier, attempt, &error);

        if !error.is_retryable() {
            return Err(error);
        }
        match self.rotate_mirror() {
            Ok(_) => Err(error),
            Err(exhausted) => Err(exhausted),
        }
    }

    async fn fetch_once(&self, identifier: &Identifier) -> Result<FetchResult, SourceError> {
        let url = self.direct_url(identifier).await?;
        self.observer.resolved(identifier, &url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::SiteAccessError(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !is_pdf_content_type(&content_type) {
            tracing::error!(
                "Failed to fetch PDF with identifier {} (resolved url {}) due to captcha",
                identifier,
                url
            );
            return Err(SourceError::CaptchaNeeded(format!(
                "{} served {} instead of a PDF",
                url,
                if content_type.is_empty() { "no content type" } else { &content_type }
            )));
        }

        let response_url = response.url().to_string();
        let bytes = response.bytes().await?.to_vec();
        let generated_name = generate_name(&response_url, &bytes);

        Ok(FetchResult {
            bytes,
            source_url: url,
            generated_name,
        })
    }
}

/// Whether a Content-Type header names exactly `application/pdf`, ignoring parameters
fn is_pdf_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false)
}

#[async_trait]
impl Source for SciHubSource {
    fn id(&self) -> &str {
        "scihub"
    }

    fn name(&self) -> &str {
        "Sci-Hub"
    }

    #[tracing::instrument(skip_all, fields(identifier = %identifier))]
    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedLink, SourceError> {
        let url = self.direct_url(identifier).await?;
        self.observer.resolved(identifier, &url);
        Ok(ResolvedLink::new(url, identifier.clone()))
    }

    #[tracing::instrument(skip_all, fields(identifier = %identifier))]
    async fn fetch(&self, identifier: &Identifier) -> Result<FetchResult, SourceError> {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        with_retry(self.retry, move || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            self.fetch_attempt(identifier, attempt)
        })
        .await
    }
}
